// Tests for the path model
// Separator normalization, lexical cleaning and the display/absolute pair

use std::path::{Path, MAIN_SEPARATOR};

use dirsum::paths::{canonical_display, clean_path, cmp_nocase, eq_nocase, leaf_of, TreePath};

#[test]
fn both_slash_flavors_normalize_to_the_host_separator() {
    let path = TreePath::new("some/dir\\inner");
    let expected = format!("some{0}dir{0}inner", MAIN_SEPARATOR);
    assert_eq!(path.display(), expected);
}

#[test]
fn a_trailing_separator_is_stripped() {
    let with = TreePath::new("some/dir/");
    let without = TreePath::new("some/dir");
    assert_eq!(with.display(), without.display());
}

#[test]
fn append_extends_display_and_absolute() {
    let base = TreePath::new("base");
    let child = base.append("leaf.txt");
    assert_eq!(child.display(), format!("base{}leaf.txt", MAIN_SEPARATOR));
    assert_eq!(child.leaf(), "leaf.txt");
    assert!(child.absolute().ends_with("leaf.txt"));
    assert!(child.absolute().is_absolute());
}

#[test]
fn relative_input_resolves_against_the_current_directory() {
    let path = TreePath::new("relative.txt");
    assert!(path.absolute().is_absolute());
    assert_eq!(path.display(), "relative.txt");
}

#[test]
fn absolute_form_contains_no_dot_components() {
    let path = TreePath::new("a/./b/../c");
    let text = path.absolute().to_string_lossy().into_owned();
    assert!(path.absolute().is_absolute());
    assert!(!text.split(MAIN_SEPARATOR).any(|part| part == "." || part == ".."));
    assert!(text.ends_with(&format!("a{}c", MAIN_SEPARATOR)));
}

#[test]
fn clean_path_collapses_dot_and_dotdot() {
    assert_eq!(clean_path(Path::new("a/./b/../c")), Path::new("a/c"));
    assert_eq!(clean_path(Path::new("./x")), Path::new("x"));
    assert_eq!(clean_path(Path::new(".")), Path::new("."));
}

#[test]
fn clean_path_keeps_leading_parent_components_of_relative_paths() {
    assert_eq!(clean_path(Path::new("../x")), Path::new("../x"));
}

#[test]
fn canonical_display_matches_clean_path() {
    let cleaned = canonical_display("dir/./sub/../file.txt");
    assert_eq!(cleaned, format!("dir{}file.txt", MAIN_SEPARATOR));
}

#[test]
fn leaf_of_returns_the_last_component() {
    assert_eq!(leaf_of("a/b/c.txt"), "c.txt");
    assert_eq!(leaf_of("a\\b\\c.txt"), "c.txt");
    assert_eq!(leaf_of("plain.txt"), "plain.txt");
}

#[test]
fn nocase_comparison_ignores_case_only() {
    assert_eq!(cmp_nocase("Abc", "abc"), std::cmp::Ordering::Equal);
    assert_eq!(cmp_nocase("abc", "abd"), std::cmp::Ordering::Less);
    assert!(eq_nocase("File.TXT", "file.txt"));
    assert!(!eq_nocase("file.txt", "file.txd"));
}

#[test]
fn same_absolute_ci_ignores_spelling_differences() {
    let a = TreePath::new("dir/FILE.txt");
    let b = TreePath::new("dir/file.txt");
    assert!(a.same_absolute_ci(&b));

    let c = TreePath::new("dir/other.txt");
    assert!(!a.same_absolute_ci(&c));
}

#[test]
fn long_relative_paths_still_get_rooted() {
    let deep: String = std::iter::repeat("segment/").take(40).collect::<String>() + "leaf.txt";
    let path = TreePath::new(&deep);
    assert!(path.absolute().is_absolute());
    assert!(path.absolute().to_string_lossy().len() > 260);
    assert_eq!(path.leaf(), "leaf.txt");
}
