// Command line module
// The argument surface predates double-dash conventions (single-dash long
// flags, positional algorithm selector), so parsing is a plain loop over
// argv rather than a derive-based parser.

use std::io::{self, Write};

use colored::Colorize;

use crate::config::Defaults;
use crate::error::DirSumError;
use crate::hash;

/// Everything the driver needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub input: String,
    pub benchmark: bool,
    pub benchmark_all: bool,
    pub hash_spec: String,
    pub output_file: Option<String>,
    pub verify_file: Option<String>,
    pub sum_mode: bool,
    pub overwrite: bool,
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
    pub threads: bool,
    pub sum_relative: bool,
    pub include_last_dir: bool,
    pub only: Vec<String>,
    pub exclude: Vec<String>,
}

fn argument_error(message: String) -> DirSumError {
    DirSumError::Argument { message }
}

fn benchmark_conflict(flag: &str) -> DirSumError {
    argument_error(format!("{} can not be combined with -benchmark", flag))
}

/// Parse argv (including the program name at index 0) against the loaded
/// defaults. The first argument is the target path or the -benchmark
/// marker; everything after it is flags plus an optional positional
/// algorithm selector.
pub fn parse_args(args: &[String], defaults: &Defaults) -> Result<CliOptions, DirSumError> {
    let mut opts = CliOptions {
        input: args[1].clone(),
        benchmark: args[1] == "-benchmark",
        benchmark_all: false,
        hash_spec: defaults.hash.clone(),
        output_file: None,
        verify_file: None,
        sum_mode: false,
        overwrite: false,
        quiet: defaults.quiet,
        no_wait: defaults.no_wait,
        progress: defaults.progress,
        clip: defaults.clip,
        hash_names: defaults.hash_names,
        strip_names: defaults.strip_names,
        lowercase: defaults.lowercase,
        skip_errors: defaults.skip_errors,
        no_logo: defaults.no_logo,
        no_follow: defaults.no_follow,
        threads: defaults.threads,
        sum_relative: defaults.sum_relative,
        include_last_dir: defaults.include_last_dir,
        only: Vec::new(),
        exclude: Vec::new(),
    };

    let mut i = 2;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-t" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(argument_error("Missing argument for switch -t".to_string()));
                };
                opts.output_file = Some(value.clone());
                i += 1;
            }
            "-overwrite" => opts.overwrite = true,
            "-nowait" => opts.no_wait = true,
            "-quiet" => opts.quiet = true,
            "-hashnames" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-hashnames"));
                }
                opts.hash_names = true;
            }
            "-stripnames" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-stripnames"));
                }
                opts.strip_names = true;
            }
            "-sum" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-sum"));
                }
                if opts.verify_file.is_some() {
                    return Err(argument_error(
                        "-sum can not be combined with -verify".to_string(),
                    ));
                }
                opts.sum_mode = true;
            }
            "-verify" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-verify"));
                }
                if opts.sum_mode {
                    return Err(argument_error(
                        "-verify can not be combined with -sum".to_string(),
                    ));
                }
                let Some(value) = args.get(i + 1) else {
                    return Err(argument_error(
                        "Missing argument for switch -verify".to_string(),
                    ));
                };
                opts.verify_file = Some(value.clone());
                i += 1;
            }
            "-exclude" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-exclude"));
                }
                if !opts.only.is_empty() {
                    return Err(argument_error(
                        "-only and -exclude cannot be specified at the same time".to_string(),
                    ));
                }
                let Some(value) = args.get(i + 1) else {
                    return Err(argument_error(
                        "Missing argument for switch -exclude".to_string(),
                    ));
                };
                opts.exclude.push(value.clone());
                i += 1;
            }
            "-only" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-only"));
                }
                if !opts.exclude.is_empty() {
                    return Err(argument_error(
                        "-only and -exclude cannot be specified at the same time".to_string(),
                    ));
                }
                let Some(value) = args.get(i + 1) else {
                    return Err(argument_error(
                        "Missing argument for switch -only".to_string(),
                    ));
                };
                opts.only.push(value.clone());
                i += 1;
            }
            "-clip" => opts.clip = true,
            "-progress" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-progress"));
                }
                opts.progress = true;
            }
            "-lowercase" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-lowercase"));
                }
                opts.lowercase = true;
            }
            "-skipError" => {
                if opts.benchmark {
                    return Err(benchmark_conflict("-skipError"));
                }
                opts.skip_errors = true;
            }
            _ => {
                if arg.eq_ignore_ascii_case("-nologo") {
                    opts.no_logo = true;
                } else if arg.eq_ignore_ascii_case("-nofollow") {
                    opts.no_follow = true;
                } else if arg.eq_ignore_ascii_case("-threads") {
                    opts.threads = true;
                } else if arg.eq_ignore_ascii_case("-sumRelativePath") {
                    opts.sum_relative = true;
                } else if arg.eq_ignore_ascii_case("-includeLastDir") {
                    opts.include_last_dir = true;
                    opts.sum_relative = true;
                } else if hash::is_hash_id_combination(arg) {
                    opts.hash_spec = arg.to_string();
                } else if opts.benchmark && arg.eq_ignore_ascii_case("All") {
                    opts.benchmark_all = true;
                } else {
                    return Err(argument_error(format!(
                        "Argument \"{}\" not recognized",
                        arg
                    )));
                }
            }
        }
        i += 1;
    }

    // a Sum=True default engages unless the run is a verification
    if defaults.sum && opts.verify_file.is_none() {
        opts.sum_mode = true;
    }

    Ok(opts)
}

/// Startup banner, suppressed by -nologo and -quiet.
pub fn print_logo() {
    let mut text = format!(
        "\ndirsum {}\n\nRecursively compute hash of a given directory content in lexicographical order.\nIt can also compute the hash of a single file.\n\nSupported Algorithms :\n",
        env!("CARGO_PKG_VERSION")
    );
    for id in hash::SUPPORTED_HASH_IDS {
        text.push(' ');
        text.push_str(id);
    }
    text.push_str("\n\n");
    print!("{}", text.green());
}

/// Full usage text, shown on argument errors and empty invocations.
pub fn print_usage() {
    print_logo();
    print!(
        "Usage: \n  dirsum DirectoryOrFilePath [HashAlgo] [-t ResultFileName] [-sum] [-sumRelativePath] [-includeLastDir] [-verify FileName] [-threads] [-clip] [-lowercase] [-overwrite] [-quiet] [-nowait] [-hashnames] [-stripnames] [-skipError] [-nologo] [-nofollow] [-exclude pattern] [-only pattern]\n  dirsum -benchmark [HashAlgo | All] [-t ResultFileName] [-clip] [-overwrite] [-quiet] [-nowait] [-nologo]\n\n  Possible values for HashAlgo (not case sensitive, default is Blake3):\n "
    );
    for id in hash::SUPPORTED_HASH_IDS {
        print!(" {}", id);
    }
    print!(
        "\nOr any combination of the above values separated by comma, except when -verify is used\n\n\
  ResultFileName: text file where the result will be appended\n\
  -benchmark: perform speed benchmark of the selected algorithm. If \"All\" is specified, then all algorithms are benchmarked.\n\
  -sum: output hash of every file processed in a format similar to shasum.\n\
  -sumRelativePath (only when -sum is specified): the file paths are stored in the output file as relative to the input directory.\n\
  -verify: verify hash against value(s) present on the specified file.\n\
           argument must be either a checksum file or a result file.\n\
  -includeLastDir (only when -sum or -verify is specified): the last directory name of the input directory is included in the SUM file entries and used in the verification process. This switch implies -sumRelativePath.\n\
  -threads (only when -sum or -verify specified): multithreading will be used to accelerate hashing of files.\n\
  -clip: copy the result to the clipboard (ignored when -sum specified)\n\
  -lowercase: output hash value(s) in lower case instead of upper case\n\
  -progress: Display information about the progress of hash operation\n\
  -overwrite (only when -t present): output text file will be overwritten\n\
  -quiet: No text is displayed or written except the hash value\n\
  -nowait: avoid displaying the waiting prompt before exiting\n\
  -hashnames: case sensitive path of the files/directories will be included in the hash computation\n\
  -stripnames (only when -hashnames present): only last path portion of files/directories is used for hash computation\n\
  -exclude (cannot be combined with -only): specifies a name pattern for files to exclude from hash computation.\n\
  -only (cannot be combined with -exclude): only files matching the pattern are included in hash computation.\n\
  -skipError: ignore any encountered errors and continue processing.\n\
  -nologo: don't display the version banner on startup.\n\
  -nofollow: don't follow symbolic links, junction points and mount points, excluding them from hash computation.\n\n"
    );
}

/// Final prompt so double-click launches keep their console window open.
pub fn wait_for_exit(no_wait: bool) {
    if !no_wait {
        print!("\n\nPress ENTER to exit the program ...");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
    }
}
