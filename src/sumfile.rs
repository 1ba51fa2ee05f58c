// Checksum and result file module
// The two on-disk grammars, their parsers, the line formatter and the
// canonical manifest ordering applied after unordered computation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, MAIN_SEPARATOR};

use crate::error::DirSumError;
use crate::hash::{from_hex, is_digest_size, to_hex};
use crate::paths;

/// One parsed checksum line. `processed` is flipped by the verification
/// driver when the corresponding file is seen on disk; entries still false
/// after the walk are reported as missing.
#[derive(Debug, Clone)]
pub struct SumEntry {
    pub digest: Vec<u8>,
    pub processed: bool,
}

/// Checksum entries keyed by display path. The ordered map gives the
/// missing-entry report a stable listing order.
pub type SumMap = BTreeMap<String, SumEntry>;

/// Parsed checksum file.
#[derive(Debug)]
pub struct SumFileData {
    pub entries: SumMap,
    pub skipped_lines: Vec<usize>,
    pub digest_len: usize,
}

/// Named entry of a result file.
#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub hash_id: String,
    pub digest: Vec<u8>,
}

/// Parsed result file. Bare digest lines carry no name and are indexed by
/// digest size instead, for single-file verification.
pub struct ResultData {
    pub by_name: BTreeMap<String, ResultEntry>,
    pub by_size: HashMap<usize, Vec<u8>>,
}

fn read_text_lossy(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Parse one checksum line into digest bytes and the stored path.
/// Grammar: hex digest, one or more spaces, optional `*`, path.
fn parse_sum_line(line: &str) -> Option<(Vec<u8>, &str)> {
    let (hex_part, rest) = line.split_once(' ')?;
    let rest = rest.trim_start_matches(' ');
    let rest = rest.strip_prefix('*').unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    let digest = from_hex(hex_part)?;
    Some((digest, rest))
}

/// Parse a checksum file.
///
/// The first non-empty line fixes the digest length for the whole file and
/// must parse; a malformed first line means the file is not a checksum file
/// at all and `Ok(None)` is returned so the caller can try the result
/// grammar instead. Later malformed lines are skipped with their 1-based
/// numbers recorded. Duplicate paths keep the last digest seen.
///
/// With `dir_prefix` set, stored paths that do not already start with the
/// input directory (compared case-insensitively) get it prepended, which
/// lets manifests written with relative paths verify in place.
pub fn parse_sum_file(
    path: &Path,
    dir_prefix: Option<&str>,
) -> Result<Option<SumFileData>, DirSumError> {
    let text = match read_text_lossy(path) {
        Some(text) => text,
        None => return Ok(None),
    };

    let mut entries = SumMap::new();
    let mut skipped_lines = Vec::new();
    let mut digest_len = 0usize;

    for (index, raw_line) in text.split('\n').enumerate() {
        let line_number = index + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() {
            continue;
        }

        let parsed = parse_sum_line(line).filter(|(digest, _)| {
            if digest_len != 0 {
                digest.len() == digest_len
            } else {
                is_digest_size(digest.len())
            }
        });

        match parsed {
            Some((digest, stored_path)) => {
                let mut entry_name = paths::normalize_separators(stored_path);
                if let Some(prefix) = dir_prefix {
                    if !prefix.is_empty() {
                        let has_prefix = entry_name
                            .get(..prefix.len())
                            .map(|head| paths::eq_nocase(head, prefix))
                            .unwrap_or(false);
                        if !has_prefix {
                            entry_name = format!("{}{}", prefix, entry_name);
                        }
                    }
                }
                digest_len = digest.len();
                entries.insert(entry_name, SumEntry { digest, processed: false });
            }
            None => {
                if line_number > 1 {
                    skipped_lines.push(line_number);
                } else {
                    return Ok(None);
                }
            }
        }
    }

    if entries.is_empty() {
        return Ok(None);
    }

    Ok(Some(SumFileData { entries, skipped_lines, digest_len }))
}

/// Parse one result line: either a bare hex digest of a supported size, or
/// `<AlgoId> hash of "<target>" (<dd> bytes) = <hex>`.
fn parse_result_line(line: &str) -> Option<(Option<(String, String)>, Vec<u8>)> {
    if line.len() < 32 {
        return None;
    }

    if let Some(digest) = from_hex(line) {
        if is_digest_size(digest.len()) {
            return Some((None, digest));
        }
        return None;
    }

    let (id_part, rest) = line.split_once(' ')?;
    let engine = crate::hash::engine_for(id_part)?;
    let rest = rest.strip_prefix("hash of \"")?;
    let (target, rest) = rest.split_once('"')?;
    let rest = rest.strip_prefix(" (")?;
    let (size_part, rest) = rest.split_once(' ')?;
    if size_part.len() != 2 {
        return None;
    }
    let size: usize = size_part.parse().ok()?;
    if size != engine.digest_size() {
        return None;
    }
    let rest = rest.strip_prefix("bytes) = ")?;
    if rest.len() != 2 * size {
        return None;
    }
    let digest = from_hex(rest)?;
    Some((Some((target.to_string(), engine.id().to_string())), digest))
}

/// Parse a result file. Any malformed non-empty line invalidates the whole
/// file (`Ok(None)`), as does a file with no usable entries.
pub fn parse_result_file(path: &Path) -> Result<Option<ResultData>, DirSumError> {
    let text = match read_text_lossy(path) {
        Some(text) => text,
        None => return Ok(None),
    };

    let mut by_name = BTreeMap::new();
    let mut by_size = HashMap::new();

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() {
            continue;
        }
        match parse_result_line(line) {
            Some((Some((target, hash_id)), digest)) => {
                by_name.insert(target, ResultEntry { hash_id, digest });
            }
            Some((None, digest)) => {
                by_size.insert(digest.len(), digest);
            }
            None => return Ok(None),
        }
    }

    if by_name.is_empty() && by_size.is_empty() {
        return Ok(None);
    }

    Ok(Some(ResultData { by_name, by_size }))
}

/// Render one manifest line.
pub fn format_sum_line(digest: &[u8], path: &str, lowercase: bool) -> String {
    format!("{}  {}\n", to_hex(digest, lowercase), path)
}

/// Directory depth of a stored path, counted in separators.
pub fn path_depth(path: &str) -> usize {
    path.matches(MAIN_SEPARATOR).count()
}

/// The canonical manifest order: deeper entries first, case-insensitive
/// lexical order within one depth, byte order as the tiebreaker for paths
/// that differ only by case. This is a total order over distinct paths,
/// so sorting an unordered manifest is deterministic.
pub fn canonical_cmp(a: &str, b: &str) -> Ordering {
    path_depth(b)
        .cmp(&path_depth(a))
        .then_with(|| paths::cmp_nocase(a, b))
        .then_with(|| a.cmp(b))
}

/// Read back an unordered manifest (a shadow file, or a freshly written
/// target), sort its entries into the canonical order and render the
/// final lines. Returns `None` if the file does not parse as a manifest.
pub fn sorted_sum_lines(
    source: &Path,
    lowercase: bool,
) -> Result<Option<Vec<String>>, DirSumError> {
    let data = match parse_sum_file(source, None)? {
        Some(data) => data,
        None => return Ok(None),
    };

    let mut entries: Vec<(String, SumEntry)> = data.entries.into_iter().collect();
    entries.sort_by(|a, b| canonical_cmp(&a.0, &b.0));

    Ok(Some(
        entries
            .iter()
            .map(|(path, entry)| format_sum_line(&entry.digest, path, lowercase))
            .collect(),
    ))
}
