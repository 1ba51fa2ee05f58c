// Output handling module
// Owns every byte that leaves the process: the per-algorithm output files
// with their shadow companions, the post-sort that restores the canonical
// manifest order, and the colored console streams.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

use colored::Colorize;

use crate::error::DirSumError;
use crate::paths::TreePath;
use crate::sumfile;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One output file plus the transient state needed to emit its entries in
/// canonical order. Threaded computation routes manifest lines through a
/// shadow file; serial computation buffers entries in memory. Both are
/// sorted and written out once the run drains, so the final manifest bytes
/// are identical either way.
pub struct OutputTarget {
    file: File,
    shadow: Option<(File, TreePath)>,
    pending: Option<Vec<(String, Vec<u8>)>>,
}

impl OutputTarget {
    /// Open (or create) the target. New and truncated files start with a
    /// UTF-8 BOM; appending to a file with prior content first writes one
    /// newline so the new block is not glued to the old one.
    pub fn create(
        path: &TreePath,
        overwrite: bool,
        with_shadow: bool,
        serial_sort: bool,
    ) -> io::Result<OutputTarget> {
        let existing_len = fs::metadata(path.absolute()).map(|m| m.len()).unwrap_or(0);

        let mut file = if overwrite {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.absolute())?
        } else {
            OpenOptions::new().append(true).create(true).open(path.absolute())?
        };

        if overwrite || existing_len == 0 {
            file.write_all(UTF8_BOM)?;
        } else if existing_len > UTF8_BOM.len() as u64 {
            file.write_all(b"\n")?;
        }

        let shadow = if with_shadow {
            let shadow_path = TreePath::new(&format!("{}.dirsum_shadow", path.display()));
            let mut shadow_file = File::create(shadow_path.absolute())?;
            shadow_file.write_all(UTF8_BOM)?;
            Some((shadow_file, shadow_path))
        } else {
            None
        };

        let pending = if serial_sort { Some(Vec::new()) } else { None };

        Ok(OutputTarget { file, shadow, pending })
    }

    fn write_message(&mut self, text: &str) {
        if let Err(e) = self.file.write_all(text.as_bytes()) {
            eprintln!("Warning: failed to write to output file: {}", e);
        }
    }

    fn write_sum_line_text(&mut self, text: &str) {
        match &mut self.shadow {
            Some((shadow_file, _)) => {
                if let Err(e) = shadow_file.write_all(text.as_bytes()) {
                    eprintln!("Warning: failed to write to shadow file: {}", e);
                }
            }
            None => self.write_message(text),
        }
    }

    fn buffer_sum_entry(&mut self, path: String, digest: Vec<u8>) {
        match &mut self.pending {
            Some(entries) => entries.push((path, digest)),
            // no buffer configured, write through in arrival order
            None => {
                let line = sumfile::format_sum_line(&digest, &path, false);
                self.write_sum_line_text(&line);
            }
        }
    }

    /// Emit the collected manifest entries in canonical order and drop the
    /// shadow file. Returns false when a shadow file failed to parse back.
    fn finish_sum(&mut self, lowercase: bool) -> Result<bool, DirSumError> {
        if let Some((shadow_file, shadow_path)) = self.shadow.take() {
            drop(shadow_file);
            // a BOM-only shadow means the walk produced no entries
            let shadow_len =
                fs::metadata(shadow_path.absolute()).map(|m| m.len()).unwrap_or(0);
            if shadow_len <= UTF8_BOM.len() as u64 {
                let _ = fs::remove_file(shadow_path.absolute());
                return Ok(true);
            }
            let lines = sumfile::sorted_sum_lines(shadow_path.absolute(), lowercase)?;
            match lines {
                Some(lines) => {
                    for line in lines {
                        self.write_message(&line);
                    }
                    let _ = fs::remove_file(shadow_path.absolute());
                    return Ok(true);
                }
                None => return Ok(false),
            }
        }

        if let Some(mut entries) = self.pending.take() {
            entries.sort_by(|a, b| sumfile::canonical_cmp(&a.0, &b.0));
            for (path, digest) in entries {
                let line = sumfile::format_sum_line(&digest, &path, lowercase);
                self.write_message(&line);
            }
        }

        Ok(true)
    }
}

/// The set of output targets, one slot per selected algorithm (slots are
/// empty when no output file was requested or a target failed to open).
pub struct OutputSink {
    targets: Vec<Option<OutputTarget>>,
}

impl OutputSink {
    pub fn new(targets: Vec<Option<OutputTarget>>) -> OutputSink {
        OutputSink { targets }
    }

    pub fn has_target(&self, index: usize) -> bool {
        matches!(self.targets.get(index), Some(Some(_)))
    }

    /// Write a message directly to the target file, bypassing any shadow.
    pub fn write_message(&mut self, index: usize, text: &str) {
        if let Some(Some(target)) = self.targets.get_mut(index) {
            target.write_message(text);
        }
    }

    /// Route a rendered manifest line to the shadow file when one exists.
    pub fn write_sum_line_text(&mut self, index: usize, text: &str) {
        if let Some(Some(target)) = self.targets.get_mut(index) {
            target.write_sum_line_text(text);
        }
    }

    /// Buffer a manifest entry for the serial post-sort.
    pub fn buffer_sum_entry(&mut self, index: usize, path: String, digest: Vec<u8>) {
        if let Some(Some(target)) = self.targets.get_mut(index) {
            target.buffer_sum_entry(path, digest);
        }
    }

    /// Finalize every sum target: sort, emit, drop shadows.
    pub fn finish_sum_targets(&mut self, lowercase: bool, quiet: bool) {
        for target in self.targets.iter_mut().flatten() {
            match target.finish_sum(lowercase) {
                Ok(true) => {}
                Ok(false) => {
                    if !quiet {
                        console_error(
                            "Failed to parse and write entries from the shadow file.\n",
                        );
                    }
                }
                Err(e) => {
                    if !quiet {
                        console_error(&format!("{}\n", e));
                    }
                }
            }
        }
    }
}

/// Errors go to stderr in red.
pub fn console_error(text: &str) {
    eprint!("{}", text.red());
}

/// Warnings, mismatch notices and digests go to stdout in yellow.
pub fn console_warn(text: &str) {
    print!("{}", text.yellow());
    let _ = io::stdout().flush();
}

/// Copy text to the system clipboard; failures are ignored, the digest is
/// already on the console.
pub fn copy_to_clipboard(text: &str) {
    if let Ok(mut clipboard) = arboard::Clipboard::new() {
        let _ = clipboard.set_text(text.to_string());
    }
}
