// Verification module
// Loads the reference (checksum file first, result file as fallback),
// enforces the digest-length guard before any file is read, and renders
// the coverage report once the walk has drained.

use crate::error::DirSumError;
use crate::output::{console_warn, OutputSink};
use crate::paths::{self, TreePath};
use crate::sumfile::{self, SumFileData, SumMap};

/// A loaded verification reference.
#[derive(Debug)]
pub enum Reference {
    /// Per-file expectations from a checksum file; verification runs the
    /// walker and compares every file.
    Sum(SumFileData),
    /// One expected digest from a result file; verification recomputes the
    /// aggregate digest and compares once.
    Single(Vec<u8>),
}

/// Parse the reference file. A file that parses as neither grammar is a
/// fatal parse error; a checksum file whose digest length differs from the
/// selected algorithm is rejected here, before any file is read.
pub fn load_reference(
    reference: &TreePath,
    input: &TreePath,
    input_is_file: bool,
    digest_size: usize,
    dir_prefix: &str,
) -> Result<Reference, DirSumError> {
    if let Some(mut data) = sumfile::parse_sum_file(reference.absolute(), Some(dir_prefix))? {
        if data.digest_len != digest_size {
            return Err(DirSumError::HashLengthMismatch {
                reference: data.digest_len,
                selected: digest_size,
            });
        }

        if input_is_file {
            // only the entry for the input file takes part in verification
            let name = input.display().to_string();
            match data.entries.remove(&name) {
                Some(entry) => {
                    let mut entries = SumMap::new();
                    entries.insert(name, entry);
                    data.entries = entries;
                }
                None => {
                    return Err(DirSumError::EntryNotFound { name });
                }
            }
        }

        return Ok(Reference::Sum(data));
    }

    if let Some(result) = sumfile::parse_result_file(reference.absolute())? {
        let name = paths::leaf_of(input.display());
        let digest = match result.by_name.get(name) {
            Some(entry) => entry.digest.clone(),
            None => match result.by_size.get(&digest_size) {
                Some(digest) => digest.clone(),
                None => {
                    return Err(DirSumError::NoResultEntry { name: name.to_string() })
                }
            },
        };

        if digest.len() != digest_size {
            return Err(DirSumError::HashLengthMismatch {
                reference: digest.len(),
                selected: digest_size,
            });
        }

        return Ok(Reference::Single(digest));
    }

    Err(DirSumError::ReferenceParse { path: reference.absolute().to_path_buf() })
}

/// Report every reference entry the walk never produced. Returns true when
/// at least one entry is missing, which fails the verification.
pub fn report_missing_entries(
    entries: &SumMap,
    reference_display: &str,
    quiet: bool,
    sink: &mut OutputSink,
) -> bool {
    let missing: Vec<&String> = entries
        .iter()
        .filter(|(_, entry)| !entry.processed)
        .map(|(name, _)| name)
        .collect();

    if missing.is_empty() {
        return false;
    }

    let header = if missing.len() == 1 {
        format!("1 entry in \"{}\" was not found:\n", reference_display)
    } else {
        format!("{} entries in \"{}\" were not found:\n", missing.len(), reference_display)
    };
    if !quiet {
        console_warn(&header);
    }
    sink.write_message(0, &header);

    for (counter, name) in missing.iter().enumerate() {
        let line = format!(" {} - {}\n", counter + 1, name);
        if !quiet {
            console_warn(&line);
        }
        sink.write_message(0, &line);
    }

    if !quiet {
        println!();
    }
    sink.write_message(0, "\n");

    true
}

/// Report the 1-based numbers of corrupted lines skipped while parsing the
/// checksum file. At most nine are listed before eliding to the last one.
pub fn report_skipped_lines(
    skipped_lines: &[usize],
    reference_display: &str,
    quiet: bool,
    sink: &mut OutputSink,
) {
    if skipped_lines.is_empty() {
        return;
    }

    let mut text = format!(
        "\n{} line(s) were skipped in \"{}\" because they are corrupted.\nSkipped lines numbers are: ",
        skipped_lines.len(),
        reference_display
    );
    for number in skipped_lines.iter().take(9) {
        text.push_str(&format!("{} ", number));
    }
    if skipped_lines.len() > 9 {
        text.push_str(&format!("... {}", skipped_lines[skipped_lines.len() - 1]));
    }
    text.push('\n');

    if !quiet {
        console_warn(&text);
    }
    sink.write_message(0, &text);
}
