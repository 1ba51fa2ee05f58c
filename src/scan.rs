// Tree hashing driver module
// One recursive driver serves all three modes: the aggregate digest feeds
// names and bytes into a shared engine set in canonical tree order, while
// sum and verify modes clone the engines per file and either process the
// file inline or hand it to the worker pool.

use std::fs::{self, File};

use crate::error::DirSumError;
use crate::hash::{self, HashEngine};
use crate::output::{console_error, console_warn, OutputSink};
use crate::paths::{self, TreePath};
use crate::pool::{Job, OutputItem, RunState, WorkerPool};
use crate::sumfile::{self, SumMap};
use crate::walker::{self, SelfSkip, WalkFilter};

/// Mode flags for one run, distilled from the command line.
pub struct ScanOptions {
    pub quiet: bool,
    pub progress: bool,
    pub hash_names: bool,
    pub strip_names: bool,
    pub skip_errors: bool,
    pub lowercase: bool,
    pub sum_mode: bool,
    pub verify_mode: bool,
    pub sum_prefix_len: usize,
    pub multi_hash: bool,
}

enum Lookup {
    NotVerify,
    Found(Vec<u8>),
    Missing,
}

/// Drives the walker over the tree and owns the shared engine state.
pub struct TreeHasher<'a> {
    opts: &'a ScanOptions,
    state: &'a RunState,
    filter: &'a WalkFilter,
    self_skip: SelfSkip,
    engines: Vec<Box<dyn HashEngine>>,
    expectations: Option<SumMap>,
    pool: Option<&'a WorkerPool>,
    sink: Option<&'a mut OutputSink>,
}

impl<'a> TreeHasher<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opts: &'a ScanOptions,
        state: &'a RunState,
        filter: &'a WalkFilter,
        self_skip: SelfSkip,
        engines: Vec<Box<dyn HashEngine>>,
        expectations: Option<SumMap>,
        pool: Option<&'a WorkerPool>,
        sink: Option<&'a mut OutputSink>,
    ) -> TreeHasher<'a> {
        TreeHasher { opts, state, filter, self_skip, engines, expectations, pool, sink }
    }

    /// Hand the engine state and the verification coverage map back once
    /// the walk is over.
    pub fn finish(self) -> (Vec<Box<dyn HashEngine>>, Option<SumMap>) {
        (self.engines, self.expectations)
    }

    /// Recursively hash one directory in canonical tree order.
    pub fn hash_directory(&mut self, dir: &TreePath) -> Result<(), DirSumError> {
        if self.state.is_fatal() {
            return Err(DirSumError::Interrupted);
        }

        let entries = match walker::read_dir_sorted(dir, self.filter, &mut self.self_skip) {
            Ok(entries) => entries,
            Err(error) => {
                let message = format!("{}\n", error);
                self.emit_message(&message, !self.opts.sum_mode || self.opts.verify_mode, true);
                if self.opts.skip_errors {
                    return Ok(());
                }
                return Err(error);
            }
        };

        if self.opts.hash_names {
            feed_name(&mut self.engines, dir.display(), self.opts.strip_names);
        }

        for entry in entries {
            if entry.is_dir {
                self.hash_directory(&entry.path)?;
            } else {
                self.hash_file(&entry.path)?;
            }
        }

        Ok(())
    }

    /// Hash one file: aggregate feed, inline sum, or job dispatch.
    pub fn hash_file(&mut self, file: &TreePath) -> Result<(), DirSumError> {
        if self.state.is_fatal() {
            return Err(DirSumError::Interrupted);
        }

        // single-file inputs come straight here, so the walker's filter
        // has not seen this name yet
        if self.filter.is_excluded(file.leaf(), true) {
            return Ok(());
        }

        let lookup = match self.expectations.as_mut() {
            None => Lookup::NotVerify,
            Some(map) => match map.get_mut(file.display()) {
                Some(entry) => {
                    entry.processed = true;
                    Lookup::Found(entry.digest.clone())
                }
                None => Lookup::Missing,
            },
        };

        let expected = match lookup {
            Lookup::NotVerify => None,
            Lookup::Found(digest) => Some(digest),
            Lookup::Missing => {
                let message =
                    format!("Error: file \"{}\" not found in checksum file.\n", file.display());
                self.emit_message(&message, true, true);
                if self.opts.skip_errors {
                    self.state.mismatch.store(true, std::sync::atomic::Ordering::SeqCst);
                    return Ok(());
                }
                return Err(DirSumError::EntryNotFound { name: file.display().to_string() });
            }
        };

        if self.opts.sum_mode {
            let mut engines = hash::clone_engines(&self.engines);
            if self.opts.hash_names {
                feed_name(&mut engines, file.display(), self.opts.strip_names);
            }
            let file_size = match fs::metadata(file.absolute()) {
                Ok(metadata) => metadata.len(),
                Err(e) => return self.open_failure(file, e),
            };
            if let Some(pool) = self.pool {
                pool.submit(Job {
                    path: file.clone(),
                    file_size,
                    engines,
                    expected,
                    quiet: self.opts.quiet,
                });
                Ok(())
            } else {
                self.process_sum_inline(file, file_size, engines, expected)
            }
        } else {
            if self.opts.hash_names {
                feed_name(&mut self.engines, file.display(), self.opts.strip_names);
            }
            let mut handle = match File::open(file.absolute()) {
                Ok(handle) => handle,
                Err(e) => return self.open_failure(file, e),
            };
            let file_size = handle.metadata().map(|m| m.len()).unwrap_or(0);
            let show_progress = self.opts.progress && !self.opts.quiet;
            if let Err(e) =
                hash::feed_file(&mut self.engines, &mut handle, file_size, file.leaf(), show_progress)
            {
                return self.read_failure(file, e);
            }
            Ok(())
        }
    }

    fn process_sum_inline(
        &mut self,
        file: &TreePath,
        file_size: u64,
        mut engines: Vec<Box<dyn HashEngine>>,
        expected: Option<Vec<u8>>,
    ) -> Result<(), DirSumError> {
        let mut handle = match File::open(file.absolute()) {
            Ok(handle) => handle,
            Err(e) => return self.open_failure(file, e),
        };

        let show_progress = self.opts.progress && !self.opts.quiet;
        if let Err(e) = hash::feed_file(&mut engines, &mut handle, file_size, file.leaf(), show_progress)
        {
            return self.read_failure(file, e);
        }

        match expected {
            Some(expected) => {
                let digest = engines[0].finalize_reset();
                if digest != expected {
                    self.state.mismatch.store(true, std::sync::atomic::Ordering::SeqCst);
                    let message =
                        format!("Hash value mismatch for \"{}\"\n", file.display());
                    if !self.opts.quiet {
                        console_warn(&message);
                    }
                    if let Some(sink) = self.sink.as_mut() {
                        sink.write_message(0, &message);
                    }
                }
            }
            None => {
                let display = file.display();
                let written = display.get(self.opts.sum_prefix_len..).unwrap_or(display);
                for (index, engine) in engines.iter_mut().enumerate() {
                    let digest = engine.finalize_reset();
                    if !self.opts.quiet {
                        let line = sumfile::format_sum_line(&digest, written, self.opts.lowercase);
                        if self.opts.multi_hash {
                            console_warn(&format!("{}: {}", engine.id(), line));
                        } else {
                            console_warn(&line);
                        }
                    }
                    if let Some(sink) = self.sink.as_mut() {
                        sink.buffer_sum_entry(index, written.to_string(), digest);
                    }
                }
            }
        }

        Ok(())
    }

    fn open_failure(&mut self, file: &TreePath, e: std::io::Error) -> Result<(), DirSumError> {
        let message =
            format!("Failed to open file \"{}\" for reading ({})\n", file.display(), e);
        self.emit_message(&message, !self.opts.sum_mode || self.opts.verify_mode, true);
        if self.opts.skip_errors {
            if self.opts.sum_mode {
                self.state.mismatch.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            Ok(())
        } else {
            Err(DirSumError::Open { path: file.absolute().to_path_buf(), source: e })
        }
    }

    fn read_failure(&mut self, file: &TreePath, e: std::io::Error) -> Result<(), DirSumError> {
        let message = format!("Failed to read file \"{}\" ({})\n", file.display(), e);
        self.emit_message(&message, !self.opts.sum_mode || self.opts.verify_mode, true);
        if self.opts.skip_errors {
            if self.opts.sum_mode {
                self.state.mismatch.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            Ok(())
        } else {
            Err(DirSumError::Read { path: file.absolute().to_path_buf(), source: e })
        }
    }

    /// Report an error message on the console (unless quiet) and mirror it
    /// to the first output file when `to_file` is set. Routed through the
    /// serialiser when a pool is running so file writes stay single-owner.
    fn emit_message(&mut self, message: &str, to_file: bool, is_error: bool) {
        let console = self.opts.skip_errors && !self.opts.quiet;
        if let Some(pool) = self.pool {
            pool.push_output(OutputItem {
                text: message.to_string(),
                console_text: None,
                quiet: !console,
                is_error,
                file_index: if to_file { Some(0) } else { None },
                is_sum_line: false,
            });
        } else {
            if console {
                if is_error {
                    console_error(message);
                } else {
                    console_warn(message);
                }
            }
            if to_file {
                if let Some(sink) = self.sink.as_mut() {
                    sink.write_message(0, message);
                }
            }
        }
    }
}

/// Feed a path name into every engine, canonicalised and optionally
/// stripped to the leaf, as UTF-16LE code units. Directory names are fed
/// before their contents, which is why the aggregate digest covers tree
/// structure and not just file bytes.
fn feed_name(engines: &mut [Box<dyn HashEngine>], display: &str, strip_names: bool) {
    let canonical = paths::canonical_display(display);
    if strip_names {
        hash::update_engines_utf16(engines, paths::leaf_of(&canonical));
    } else {
        hash::update_engines_utf16(engines, &canonical);
    }
}
