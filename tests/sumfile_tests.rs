// Tests for the checksum and result file grammars
// Parsing edge cases, the skipped-line policy and the canonical order

use std::cmp::Ordering;
use std::fs;
use std::path::MAIN_SEPARATOR;

use tempfile::TempDir;

use dirsum::sumfile::{
    canonical_cmp, format_sum_line, parse_result_file, parse_sum_file, path_depth,
    sorted_sum_lines,
};

const DIGEST_A: &str = "5891B5B522D5DF086D0FF0B110FBD9D21BB4FC7163AF34D08286A2E846F6BE03";
const DIGEST_B: &str = "2D711642B726B04401627CA9FBAC32F5C8530FB1903CC4DB02258717921A4881";

fn write_ref(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn basic_checksum_lines_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{}  a.txt\n{}  b.txt\n", DIGEST_A, DIGEST_B),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert_eq!(data.entries.len(), 2);
    assert_eq!(data.digest_len, 32);
    assert!(data.skipped_lines.is_empty());
    assert_eq!(
        data.entries.get("a.txt").unwrap().digest,
        dirsum::hash::from_hex(DIGEST_A).unwrap()
    );
}

#[test]
fn single_space_star_and_cr_are_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{} *a.txt\r\n{}  b.txt\r\n", DIGEST_A, DIGEST_B),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert!(data.entries.contains_key("a.txt"));
    assert!(data.entries.contains_key("b.txt"));
}

#[test]
fn bom_and_empty_lines_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("\u{FEFF}{}  a.txt\n\n{}  b.txt\n\n", DIGEST_A, DIGEST_B),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert_eq!(data.entries.len(), 2);
}

#[test]
fn malformed_first_line_means_not_a_checksum_file() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(&dir, "sums.txt", "this is not a checksum line\n");
    assert!(parse_sum_file(&path, None).unwrap().is_none());
}

#[test]
fn later_malformed_lines_are_skipped_and_recorded() {
    // a 20-byte digest on line 1 fixes the length; the 32-byte digest on
    // line 2 no longer fits and is skipped
    let sha1_digest = "AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D";
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{}  first.txt\n{}  second.txt\ngarbage\n", sha1_digest, DIGEST_A),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert_eq!(data.digest_len, 20);
    assert_eq!(data.entries.len(), 1);
    assert!(data.entries.contains_key("first.txt"));
    assert_eq!(data.skipped_lines, vec![2, 3]);
}

#[test]
fn duplicate_paths_keep_the_last_digest() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{}  same.txt\n{}  same.txt\n", DIGEST_A, DIGEST_B),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert_eq!(data.entries.len(), 1);
    assert_eq!(
        data.entries.get("same.txt").unwrap().digest,
        dirsum::hash::from_hex(DIGEST_B).unwrap()
    );
}

#[test]
fn missing_directory_prefix_is_prepended() {
    let dir = TempDir::new().unwrap();
    let prefix = format!("root{}", MAIN_SEPARATOR);
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{}  a.txt\n{}  ROOT{}b.txt\n", DIGEST_A, DIGEST_B, MAIN_SEPARATOR),
    );

    let data = parse_sum_file(&path, Some(&prefix)).unwrap().unwrap();
    assert!(data.entries.contains_key(&format!("root{}a.txt", MAIN_SEPARATOR)));
    // the second entry already starts with the prefix, compared
    // case-insensitively, so it is kept as written
    assert!(data.entries.contains_key(&format!("ROOT{}b.txt", MAIN_SEPARATOR)));
}

#[test]
fn foreign_separators_normalize_on_parse() {
    let dir = TempDir::new().unwrap();
    let foreign = if MAIN_SEPARATOR == '/' { '\\' } else { '/' };
    let path = write_ref(
        &dir,
        "sums.txt",
        &format!("{}  sub{}inner.txt\n", DIGEST_A, foreign),
    );

    let data = parse_sum_file(&path, None).unwrap().unwrap();
    assert!(data.entries.contains_key(&format!("sub{}inner.txt", MAIN_SEPARATOR)));
}

#[test]
fn result_file_named_and_bare_lines_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "result.txt",
        &format!(
            "SHA256 hash of \"hello.txt\" (32 bytes) = {}\n{}\n",
            DIGEST_A, DIGEST_B
        ),
    );

    let data = parse_result_file(&path).unwrap().unwrap();
    let entry = data.by_name.get("hello.txt").unwrap();
    assert_eq!(entry.hash_id, "SHA256");
    assert_eq!(entry.digest, dirsum::hash::from_hex(DIGEST_A).unwrap());
    assert_eq!(
        data.by_size.get(&32).unwrap(),
        &dirsum::hash::from_hex(DIGEST_B).unwrap()
    );
}

#[test]
fn result_file_with_wrong_size_annotation_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "result.txt",
        &format!("SHA256 hash of \"hello.txt\" (64 bytes) = {}\n", DIGEST_A),
    );
    assert!(parse_result_file(&path).unwrap().is_none());
}

#[test]
fn result_file_with_any_bad_line_fails_entirely() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(
        &dir,
        "result.txt",
        &format!(
            "SHA256 hash of \"hello.txt\" (32 bytes) = {}\nnot a result line at all padding\n",
            DIGEST_A
        ),
    );
    assert!(parse_result_file(&path).unwrap().is_none());
}

#[test]
fn format_sum_line_uses_two_spaces() {
    let digest = dirsum::hash::from_hex(DIGEST_A).unwrap();
    assert_eq!(
        format_sum_line(&digest, "dir/file.txt", false),
        format!("{}  dir/file.txt\n", DIGEST_A)
    );
}

#[test]
fn depth_counts_separators() {
    assert_eq!(path_depth("plain.txt"), 0);
    assert_eq!(path_depth(&format!("a{0}b{0}c.txt", MAIN_SEPARATOR)), 2);
}

#[test]
fn canonical_order_is_deeper_first_then_nocase_lexical() {
    let deep = format!("z{}deep.txt", MAIN_SEPARATOR);
    assert_eq!(canonical_cmp(&deep, "a.txt"), Ordering::Less);
    assert_eq!(canonical_cmp("a.txt", &deep), Ordering::Greater);
    assert_eq!(canonical_cmp("a.txt", "B.txt"), Ordering::Less);
    assert_eq!(canonical_cmp("B.txt", "a.txt"), Ordering::Greater);
}

#[test]
fn canonical_order_is_total_over_distinct_paths() {
    let paths = ["a.txt", "A.txt", "b.txt", &format!("x{}y.txt", MAIN_SEPARATOR)];
    for p in &paths {
        assert_eq!(canonical_cmp(p, p), Ordering::Equal);
        for q in &paths {
            if p != q {
                let forward = canonical_cmp(p, q);
                assert_ne!(forward, Ordering::Equal, "{} vs {}", p, q);
                assert_eq!(forward, canonical_cmp(q, p).reverse());
            }
        }
    }
}

#[test]
fn sorted_sum_lines_rewrites_in_canonical_order() {
    let dir = TempDir::new().unwrap();
    let deep = format!("sub{}deep.txt", MAIN_SEPARATOR);
    let path = write_ref(
        &dir,
        "shadow.txt",
        &format!("{}  b.txt\n{}  {}\n{}  a.txt\n", DIGEST_A, DIGEST_B, deep, DIGEST_A),
    );

    let lines = sorted_sum_lines(&path, false).unwrap().unwrap();
    assert_eq!(
        lines,
        vec![
            format!("{}  {}\n", DIGEST_B, deep),
            format!("{}  a.txt\n", DIGEST_A),
            format!("{}  b.txt\n", DIGEST_A),
        ]
    );
}

#[test]
fn sorted_sum_lines_honors_hex_case() {
    let dir = TempDir::new().unwrap();
    let path = write_ref(&dir, "shadow.txt", &format!("{}  a.txt\n", DIGEST_A));

    let lines = sorted_sum_lines(&path, true).unwrap().unwrap();
    assert_eq!(lines, vec![format!("{}  a.txt\n", DIGEST_A.to_lowercase())]);
}
