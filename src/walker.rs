// Directory enumeration module
// Produces the filtered, case-insensitively sorted entry list for one
// directory at a time. This per-directory order is what makes every mode
// of the tool deterministic.

use std::fs;

use glob::{MatchOptions, Pattern};

use crate::error::DirSumError;
use crate::paths::{self, TreePath};

/// One surviving directory entry.
#[derive(Debug)]
pub struct DirEntry {
    pub path: TreePath,
    pub is_dir: bool,
}

/// Include/exclude filter over entry leaf names. Include patterns apply to
/// files only (directories are always descended so matching files deeper in
/// the tree are still found); exclude patterns apply to files and
/// directories alike. Matching is case-insensitive with `*` and `?`.
pub struct WalkFilter {
    only: Vec<Pattern>,
    exclude: Vec<Pattern>,
    pub follow_links: bool,
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

impl WalkFilter {
    pub fn new(
        only: &[String],
        exclude: &[String],
        follow_links: bool,
    ) -> Result<WalkFilter, DirSumError> {
        let compile = |specs: &[String]| -> Result<Vec<Pattern>, DirSumError> {
            specs
                .iter()
                .map(|spec| {
                    Pattern::new(spec).map_err(|e| DirSumError::Argument {
                        message: format!("Invalid pattern \"{}\": {}", spec, e),
                    })
                })
                .collect()
        };
        Ok(WalkFilter {
            only: compile(only)?,
            exclude: compile(exclude)?,
            follow_links,
        })
    }

    /// True when the entry must be dropped.
    pub fn is_excluded(&self, name: &str, is_file: bool) -> bool {
        if is_file && !self.only.is_empty() {
            let matched = self
                .only
                .iter()
                .any(|p| p.matches_with(name, match_options()));
            return !matched;
        }

        self.exclude
            .iter()
            .any(|p| p.matches_with(name, match_options()))
    }
}

/// Suppresses the manifest output file (or the verification reference)
/// when it lies inside the tree being hashed. Only the first match is
/// skipped so a user picking a common name cannot blank out the tree.
pub struct SelfSkip {
    target: Option<TreePath>,
    done: bool,
}

impl SelfSkip {
    pub fn new(target: Option<TreePath>) -> SelfSkip {
        let done = target.is_none();
        SelfSkip { target, done }
    }

    /// Disabled skip for modes without a distinguished file.
    pub fn none() -> SelfSkip {
        SelfSkip { target: None, done: true }
    }

    pub fn should_skip(&mut self, entry: &TreePath) -> bool {
        if self.done {
            return false;
        }
        match &self.target {
            Some(target) if target.same_absolute_ci(entry) => {
                self.done = true;
                true
            }
            _ => false,
        }
    }
}

/// Enumerate one directory, apply the follow-link filter, the
/// include/exclude filter and the self-file skip, then sort survivors by
/// leaf name, case-insensitively. Directories and files share one sorted
/// sequence; the caller descends and emits in exactly this order.
pub fn read_dir_sorted(
    dir: &TreePath,
    filter: &WalkFilter,
    self_skip: &mut SelfSkip,
) -> Result<Vec<DirEntry>, DirSumError> {
    let reader = fs::read_dir(dir.absolute()).map_err(|e| DirSumError::Enumerate {
        path: dir.absolute().to_path_buf(),
        source: e,
    })?;

    let mut entries = Vec::new();

    for item in reader {
        let item = item.map_err(|e| DirSumError::Enumerate {
            path: dir.absolute().to_path_buf(),
            source: e,
        })?;

        let name = item.file_name().to_string_lossy().into_owned();
        let entry_path = dir.append(&name);

        let file_type = match item.file_type() {
            Ok(t) => t,
            Err(e) => {
                return Err(DirSumError::Enumerate {
                    path: entry_path.absolute().to_path_buf(),
                    source: e,
                })
            }
        };

        if !filter.follow_links && paths::is_reparse_point(entry_path.absolute()) {
            continue;
        }

        // follow_links means a symlinked directory walks like a directory
        let is_dir = if file_type.is_symlink() {
            fs::metadata(entry_path.absolute())
                .map(|m| m.is_dir())
                .unwrap_or(false)
        } else {
            file_type.is_dir()
        };

        if filter.is_excluded(&name, !is_dir) {
            continue;
        }

        if !is_dir && self_skip.should_skip(&entry_path) {
            continue;
        }

        entries.push(DirEntry { path: entry_path, is_dir });
    }

    // byte order breaks ties between names differing only by case, so the
    // walk order is total
    entries.sort_by(|a, b| {
        paths::cmp_nocase(a.path.leaf(), b.path.leaf())
            .then_with(|| a.path.leaf().cmp(b.path.leaf()))
    });

    Ok(entries)
}
