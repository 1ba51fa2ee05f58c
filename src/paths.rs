// Path model module
// Keeps the user-facing display form and the absolute form used for
// filesystem calls side by side, normalizes separators across both slash
// flavors, and detects reparse points without following them.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// A path as the user wrote it plus the canonical absolute form every
/// filesystem call goes through.
///
/// The display form keeps the user's spelling (relative or absolute) with
/// separators normalized to the host flavor; the absolute form is rooted,
/// free of `.` and `..` components, and on Windows carries the long-path
/// escape when the host needs it.
#[derive(Debug, Clone)]
pub struct TreePath {
    display: String,
    absolute: PathBuf,
}

impl TreePath {
    /// Build a path from user input. Both slash flavors are accepted; a
    /// single trailing separator is stripped so directory names hash the
    /// same whether or not the user typed one.
    pub fn new(input: &str) -> TreePath {
        let mut display = normalize_separators(input);
        strip_trailing_separator(&mut display);
        let absolute = make_absolute(&display);
        TreePath { display, absolute }
    }

    /// New path for a child entry: both forms gain one separator and the
    /// leaf name.
    pub fn append(&self, name: &str) -> TreePath {
        let mut display = self.display.clone();
        display.push(MAIN_SEPARATOR);
        display.push_str(name);
        let absolute = self.absolute.join(name);
        TreePath { display, absolute }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Last path component of the display form.
    pub fn leaf(&self) -> &str {
        leaf_of(&self.display)
    }

    /// Case-insensitive comparison of the absolute forms, used to suppress
    /// the output/reference file when it lies inside the hashed tree.
    pub fn same_absolute_ci(&self, other: &TreePath) -> bool {
        let a = self.absolute.to_string_lossy();
        let b = other.absolute.to_string_lossy();
        a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
    }
}

/// Convert both slash flavors to the host separator.
pub fn normalize_separators(input: &str) -> String {
    input
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

fn strip_trailing_separator(path: &mut String) {
    if path.len() > 1 && path.ends_with(MAIN_SEPARATOR) && !is_root_spelling(path) {
        path.pop();
    }
}

#[cfg(windows)]
fn is_root_spelling(path: &str) -> bool {
    // "C:\" must keep its separator to stay a root
    let bytes = path.as_bytes();
    bytes.len() == 3 && bytes[1] == b':' && bytes[2] == b'\\'
}

#[cfg(not(windows))]
fn is_root_spelling(path: &str) -> bool {
    path == "/"
}

/// Last component of a path string, tolerating either separator.
pub fn leaf_of(path: &str) -> &str {
    path.rsplit(|c| c == '\\' || c == '/').next().unwrap_or(path)
}

/// Collapse `.`, `..` and duplicate separators without touching the
/// filesystem, so paths that do not exist yet still normalize.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {
                continue;
            }
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                    continue;
                }
                // keep ".." at a root boundary out entirely for rooted paths
                if matches!(
                    components.last(),
                    Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    continue;
                }
                components.push(component);
            }
            _ => {
                components.push(component);
            }
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component.as_os_str());
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Lexically canonicalized display form, used when names feed the digest.
pub fn canonical_display(display: &str) -> String {
    clean_path(Path::new(display)).to_string_lossy().into_owned()
}

/// Resolve the display form to a rooted absolute path.
fn make_absolute(display: &str) -> PathBuf {
    if display.is_empty() {
        return PathBuf::new();
    }

    let candidate = if is_absolute_input(display) {
        PathBuf::from(display)
    } else {
        resolve_relative(display)
    };

    let cleaned = clean_path(&candidate);
    apply_long_path_escape(cleaned)
}

#[cfg(windows)]
fn is_absolute_input(display: &str) -> bool {
    Path::new(display).is_absolute() || display.starts_with("\\\\")
}

#[cfg(not(windows))]
fn is_absolute_input(display: &str) -> bool {
    Path::new(display).is_absolute()
}

fn current_directory() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(windows)]
fn resolve_relative(display: &str) -> PathBuf {
    let cwd = current_directory();
    // "\foo" is drive-relative: it inherits the drive of the current
    // directory rather than resolving under it.
    if display.starts_with('\\') && !display.starts_with("\\\\") {
        if let Some(Component::Prefix(prefix)) = cwd.components().next() {
            let mut rooted = prefix.as_os_str().to_os_string();
            rooted.push(display);
            return PathBuf::from(rooted);
        }
    }
    cwd.join(display)
}

#[cfg(not(windows))]
fn resolve_relative(display: &str) -> PathBuf {
    current_directory().join(display)
}

#[cfg(windows)]
fn apply_long_path_escape(path: PathBuf) -> PathBuf {
    const SHORT_PATH_MAX: usize = 260;

    let text = path.to_string_lossy();
    if text.starts_with("\\\\?\\") || text.len() <= SHORT_PATH_MAX {
        return path;
    }
    if let Some(unc) = text.strip_prefix("\\\\") {
        PathBuf::from(format!("\\\\?\\UNC\\{}", unc))
    } else {
        PathBuf::from(format!("\\\\?\\{}", text))
    }
}

#[cfg(not(windows))]
fn apply_long_path_escape(path: PathBuf) -> PathBuf {
    path
}

/// True when the path is a reparse point (symlink, and on Windows also a
/// junction or mount point). The check never follows the link; a path that
/// cannot be inspected is treated as a plain entry.
pub fn is_reparse_point(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(metadata) => metadata.file_type().is_symlink(),
        Err(_) => false,
    }
}

/// Case-insensitive ordering used for directory entries and manifest paths.
pub fn cmp_nocase(a: &str, b: &str) -> std::cmp::Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Case-insensitive string equality without allocating.
pub fn eq_nocase(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
