// Tests for verification
// Reference loading, the digest-length guard, coverage tracking and the
// manifest/result round trips

use std::fs;
use std::path::MAIN_SEPARATOR;

use tempfile::TempDir;

use dirsum::hash::{self, parse_hash_spec, to_hex};
use dirsum::paths::TreePath;
use dirsum::pool::RunState;
use dirsum::scan::{ScanOptions, TreeHasher};
use dirsum::sumfile::SumMap;
use dirsum::verify::{load_reference, report_missing_entries, Reference};
use dirsum::walker::{SelfSkip, WalkFilter};
use dirsum::output::OutputSink;

fn tree_path(dir: &TempDir) -> TreePath {
    TreePath::new(&dir.path().to_string_lossy())
}

fn dir_prefix(root: &TreePath) -> String {
    format!("{}{}", root.display(), MAIN_SEPARATOR)
}

fn scan_options(sum_mode: bool, verify_mode: bool) -> ScanOptions {
    ScanOptions {
        quiet: true,
        progress: false,
        hash_names: false,
        strip_names: false,
        skip_errors: false,
        lowercase: false,
        sum_mode,
        verify_mode,
        sum_prefix_len: 0,
        multi_hash: false,
    }
}

/// Write a canonical manifest for the tree, serially, with full paths.
fn write_manifest(root: &TreePath, manifest: &std::path::Path) {
    use dirsum::output::OutputTarget;

    let out_path = TreePath::new(&manifest.to_string_lossy());
    let target = OutputTarget::create(&out_path, true, false, true).unwrap();
    let mut sink = OutputSink::new(vec![Some(target)]);

    let engines = parse_hash_spec("SHA256").unwrap();
    let state = RunState::new();
    let filter = WalkFilter::new(&[], &[], true).unwrap();
    let opts = scan_options(true, false);
    {
        let mut hasher = TreeHasher::new(
            &opts,
            &state,
            &filter,
            SelfSkip::none(),
            engines,
            None,
            None,
            Some(&mut sink),
        );
        hasher.hash_directory(root).unwrap();
        hasher.finish();
    }
    sink.finish_sum_targets(false, true);
}

/// Run sum verification over the tree and return the state plus coverage.
fn run_verification(root: &TreePath, entries: SumMap) -> (RunState, SumMap) {
    let engines = parse_hash_spec("SHA256").unwrap();
    let state = RunState::new();
    let filter = WalkFilter::new(&[], &[], true).unwrap();
    let opts = scan_options(true, true);

    let remaining;
    {
        let mut hasher = TreeHasher::new(
            &opts,
            &state,
            &filter,
            SelfSkip::none(),
            engines,
            Some(entries),
            None,
            None,
        );
        hasher.hash_directory(root).unwrap();
        let (_, expectations) = hasher.finish();
        remaining = expectations.unwrap();
    }
    (state, remaining)
}

fn build_tree(dir: &TempDir) {
    fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), "beta").unwrap();
}

#[test]
fn manifest_roundtrip_verifies_clean() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    let reference = TreePath::new(&manifest.to_string_lossy());
    let data = match load_reference(&reference, &root, false, 32, &dir_prefix(&root)).unwrap() {
        Reference::Sum(data) => data,
        Reference::Single(_) => panic!("expected a checksum reference"),
    };
    assert_eq!(data.entries.len(), 2);

    let (state, entries) = run_verification(&root, data.entries);
    assert!(!state.mismatch_found());
    assert!(entries.values().all(|e| e.processed));
}

#[test]
fn changed_file_raises_the_mismatch_flag() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    fs::write(dir.path().join("a.txt"), "tampered").unwrap();

    let reference = TreePath::new(&manifest.to_string_lossy());
    let Reference::Sum(data) =
        load_reference(&reference, &root, false, 32, &dir_prefix(&root)).unwrap()
    else {
        panic!("expected a checksum reference");
    };

    let (state, _) = run_verification(&root, data.entries);
    assert!(state.mismatch_found());
}

#[test]
fn entry_absent_on_disk_is_reported_missing() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    // append an entry for a file that does not exist on disk
    let ghost_digest = to_hex(&vec![0u8; 32], false);
    let ghost_line = format!("{}  {}{}ghost.txt\n", ghost_digest, root.display(), MAIN_SEPARATOR);
    let mut content = fs::read(&manifest).unwrap();
    content.extend_from_slice(ghost_line.as_bytes());
    fs::write(&manifest, content).unwrap();

    let reference = TreePath::new(&manifest.to_string_lossy());
    let Reference::Sum(data) =
        load_reference(&reference, &root, false, 32, &dir_prefix(&root)).unwrap()
    else {
        panic!("expected a checksum reference");
    };

    let (state, entries) = run_verification(&root, data.entries);

    let mut sink = OutputSink::new(vec![None]);
    let any_missing = report_missing_entries(&entries, "ref.sum", true, &mut sink);
    assert!(any_missing);
    let unprocessed: Vec<&String> = entries
        .iter()
        .filter(|(_, e)| !e.processed)
        .map(|(name, _)| name)
        .collect();
    assert_eq!(unprocessed.len(), 1);
    assert!(unprocessed[0].ends_with("ghost.txt"));

    // the two real files verified without mismatch
    assert!(!state.mismatch_found());
}

#[test]
fn digest_length_guard_rejects_before_any_file_is_read() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    let reference = TreePath::new(&manifest.to_string_lossy());
    // SHA-512 selected against a SHA-256 manifest
    let error = load_reference(&reference, &root, false, 64, &dir_prefix(&root)).unwrap_err();
    assert_eq!(error.exit_code(), 4);
}

#[test]
fn unparseable_reference_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let root = tree_path(&dir);

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    fs::write(&manifest, "neither a checksum nor a result line\n").unwrap();

    let reference = TreePath::new(&manifest.to_string_lossy());
    let error = load_reference(&reference, &root, false, 32, "").unwrap_err();
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn single_file_verification_restricts_to_its_entry() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);
    let target = root.append("a.txt");

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    let reference = TreePath::new(&manifest.to_string_lossy());
    let Reference::Sum(data) =
        load_reference(&reference, &target, true, 32, "").unwrap()
    else {
        panic!("expected a checksum reference");
    };
    assert_eq!(data.entries.len(), 1);
    assert!(data.entries.contains_key(target.display()));
}

#[test]
fn single_file_without_an_entry_is_a_missing_entry_error() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);
    let target = root.append("unlisted.txt");

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    write_manifest(&root, &manifest);

    let reference = TreePath::new(&manifest.to_string_lossy());
    let error = load_reference(&reference, &target, true, 32, "").unwrap_err();
    assert_eq!(error.exit_code(), 5);
}

#[test]
fn result_file_roundtrip_for_a_single_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();
    let target = tree_path(&dir).append("hello.txt");

    // result line as single-digest mode writes it
    let mut engine = hash::engine_for("SHA256").unwrap();
    engine.update(b"hello\n");
    let digest = engine.finalize_reset();
    let ref_dir = TempDir::new().unwrap();
    let result_file = ref_dir.path().join("result.txt");
    fs::write(
        &result_file,
        format!(
            "SHA256 hash of \"hello.txt\" (32 bytes) = {}\n",
            to_hex(&digest, false)
        ),
    )
    .unwrap();

    let reference = TreePath::new(&result_file.to_string_lossy());
    let Reference::Single(expected) =
        load_reference(&reference, &target, true, 32, "").unwrap()
    else {
        panic!("expected a single-digest reference");
    };
    assert_eq!(expected, digest);
}

#[test]
fn bare_digest_result_line_matches_by_size() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.bin"), "payload").unwrap();
    let target = tree_path(&dir).append("data.bin");

    let digest = vec![0x5A; 32];
    let ref_dir = TempDir::new().unwrap();
    let result_file = ref_dir.path().join("result.txt");
    fs::write(&result_file, format!("{}\n", to_hex(&digest, true))).unwrap();

    let reference = TreePath::new(&result_file.to_string_lossy());
    let Reference::Single(expected) =
        load_reference(&reference, &target, true, 32, "").unwrap()
    else {
        panic!("expected a single-digest reference");
    };
    assert_eq!(expected, digest);
}

#[test]
fn result_file_without_usable_entry_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("other.txt"), "o").unwrap();
    let target = tree_path(&dir).append("other.txt");

    let ref_dir = TempDir::new().unwrap();
    let result_file = ref_dir.path().join("result.txt");
    // named entry for a different file, and a digest size that cannot
    // match the selected algorithm
    fs::write(
        &result_file,
        format!(
            "SHA512 hash of \"somefile.txt\" (64 bytes) = {}\n",
            to_hex(&vec![1u8; 64], false)
        ),
    )
    .unwrap();

    let reference = TreePath::new(&result_file.to_string_lossy());
    let error = load_reference(&reference, &target, true, 32, "").unwrap_err();
    assert_eq!(error.exit_code(), 8);
}

#[test]
fn relative_manifest_verifies_with_prefix_rerooting() {
    let dir = TempDir::new().unwrap();
    build_tree(&dir);
    let root = tree_path(&dir);

    // manifest with paths relative to the root, as -sumRelativePath writes
    let mut engine = hash::engine_for("SHA256").unwrap();
    engine.update(b"alpha");
    let digest_a = engine.finalize_reset();
    engine.update(b"beta");
    let digest_b = engine.finalize_reset();

    let ref_dir = TempDir::new().unwrap();
    let manifest = ref_dir.path().join("ref.sum");
    fs::write(
        &manifest,
        format!(
            "{}  a.txt\n{}  sub{}b.txt\n",
            to_hex(&digest_a, false),
            to_hex(&digest_b, false),
            MAIN_SEPARATOR
        ),
    )
    .unwrap();

    let reference = TreePath::new(&manifest.to_string_lossy());
    let Reference::Sum(data) =
        load_reference(&reference, &root, false, 32, &dir_prefix(&root)).unwrap()
    else {
        panic!("expected a checksum reference");
    };

    let (state, entries) = run_verification(&root, data.entries);
    assert!(!state.mismatch_found());
    assert!(entries.values().all(|e| e.processed));
}
