// Configuration module
// Built-in defaults optionally overridden by a dirsum.ini file sitting
// next to the executable. Only the [Defaults] section is read; unknown
// keys are ignored.

use std::env;
use std::fs;
use std::path::PathBuf;

use crate::hash;

/// Defaults for every command line toggle.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub hash: String,
    pub quiet: bool,
    pub no_wait: bool,
    pub progress: bool,
    pub clip: bool,
    pub hash_names: bool,
    pub strip_names: bool,
    pub lowercase: bool,
    pub skip_errors: bool,
    pub no_logo: bool,
    pub no_follow: bool,
    pub sum: bool,
    pub threads: bool,
    pub sum_relative: bool,
    pub include_last_dir: bool,
}

impl Default for Defaults {
    fn default() -> Defaults {
        Defaults {
            hash: "Blake3".to_string(),
            quiet: false,
            no_wait: false,
            progress: false,
            clip: false,
            hash_names: false,
            strip_names: false,
            lowercase: false,
            skip_errors: false,
            no_logo: false,
            no_follow: false,
            sum: false,
            threads: false,
            sum_relative: false,
            include_last_dir: false,
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join("dirsum.ini"))
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Apply the [Defaults] section of an INI document over the built-ins.
fn apply_ini(defaults: &mut Defaults, text: &str) {
    let mut in_defaults = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_defaults = section.eq_ignore_ascii_case("Defaults");
            continue;
        }

        if !in_defaults {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key.eq_ignore_ascii_case("Hash") {
            if hash::is_hash_id(value) {
                defaults.hash = value.to_string();
            }
            continue;
        }

        let Some(flag) = parse_bool(value) else {
            continue;
        };

        if key.eq_ignore_ascii_case("Quiet") {
            defaults.quiet = flag;
        } else if key.eq_ignore_ascii_case("NoWait") {
            defaults.no_wait = flag;
        } else if key.eq_ignore_ascii_case("ShowProgress") {
            defaults.progress = flag;
        } else if key.eq_ignore_ascii_case("hashnames") {
            defaults.hash_names = flag;
        } else if key.eq_ignore_ascii_case("stripnames") {
            defaults.strip_names = flag;
        } else if key.eq_ignore_ascii_case("clip") {
            defaults.clip = flag;
        } else if key.eq_ignore_ascii_case("lowercase") {
            defaults.lowercase = flag;
        } else if key.eq_ignore_ascii_case("SkipError") {
            defaults.skip_errors = flag;
        } else if key.eq_ignore_ascii_case("NoLogo") {
            defaults.no_logo = flag;
        } else if key.eq_ignore_ascii_case("NoFollow") {
            defaults.no_follow = flag;
        } else if key.eq_ignore_ascii_case("Sum") {
            defaults.sum = flag;
        } else if key.eq_ignore_ascii_case("Threads") {
            defaults.threads = flag;
        } else if key.eq_ignore_ascii_case("SumRelativePath") {
            defaults.sum_relative = flag;
        } else if key.eq_ignore_ascii_case("IncludeLastDir") {
            defaults.include_last_dir = flag;
        }
        // anything else is ignored
    }
}

/// Load the defaults, merging dirsum.ini when present.
pub fn load_defaults() -> Defaults {
    let mut defaults = Defaults::default();
    if let Some(path) = config_file_path() {
        if let Ok(text) = fs::read_to_string(&path) {
            apply_ini(&mut defaults, &text);
        }
    }
    defaults
}
