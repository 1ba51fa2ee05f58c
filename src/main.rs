// dirsum binary
// Wires configuration, argument parsing, the walker driver, the worker
// pool and the final reporting together, and turns errors into the
// documented exit codes.

use std::env;
use std::fs;
use std::io::Write;
use std::path::MAIN_SEPARATOR;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dirsum::benchmark;
use dirsum::cli;
use dirsum::config;
use dirsum::error::DirSumError;
use dirsum::hash::{self, HashEngine};
use dirsum::output::{console_error, console_warn, copy_to_clipboard, OutputSink, OutputTarget};
use dirsum::paths::{self, TreePath};
use dirsum::pool::{self, PoolOptions, RunState, WorkerPool};
use dirsum::scan::{ScanOptions, TreeHasher};
use dirsum::sumfile::SumMap;
use dirsum::verify::{self, Reference};
use dirsum::walker::{SelfSkip, WalkFilter};

fn main() {
    process::exit(run());
}

fn fail(error: &DirSumError, quiet: bool, no_wait: bool) -> i32 {
    if !quiet {
        console_error(&format!("{}\n", error));
    }
    cli::wait_for_exit(no_wait);
    error.exit_code()
}

fn run() -> i32 {
    let defaults = config::load_defaults();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        cli::print_usage();
        cli::wait_for_exit(defaults.no_wait);
        return 1;
    }

    let opts = match cli::parse_args(&args, &defaults) {
        Ok(opts) => opts,
        Err(error) => {
            cli::print_usage();
            return fail(&error, false, defaults.no_wait);
        }
    };

    let mut engines: Vec<Box<dyn HashEngine>> = if opts.benchmark_all {
        Vec::new()
    } else {
        match hash::parse_hash_spec(&opts.hash_spec) {
            Ok(engines) => engines,
            Err(error) => return fail(&error, opts.quiet, opts.no_wait),
        }
    };

    if !opts.quiet && !opts.no_logo {
        cli::print_logo();
    }

    if opts.verify_file.is_some() && engines.len() > 1 {
        return fail(&DirSumError::MultiHashVerify, opts.quiet, opts.no_wait);
    }

    let sum_computation = opts.sum_mode && opts.verify_file.is_none();
    let use_threads = opts.threads && pool::worker_count() > 0;

    // one output file per algorithm in multi-algorithm sum mode, a single
    // file otherwise
    let multi_sum = sum_computation && engines.len() > 1;
    let target_count = if engines.is_empty() {
        1
    } else if multi_sum {
        engines.len()
    } else {
        1
    };

    let mut output_base: Option<TreePath> = None;
    let mut targets: Vec<Option<OutputTarget>> = Vec::new();
    if let Some(base) = &opts.output_file {
        let base_path = TreePath::new(base);
        for index in 0..target_count {
            let target_path = if multi_sum {
                TreePath::new(&format!("{}.{}", base, engines[index].id()))
            } else {
                base_path.clone()
            };
            let with_shadow = sum_computation && use_threads;
            let serial_sort = sum_computation && !use_threads;
            match OutputTarget::create(&target_path, opts.overwrite, with_shadow, serial_sort) {
                Ok(target) => targets.push(Some(target)),
                Err(_) => {
                    if !opts.quiet {
                        let id = if engines.is_empty() { "" } else { engines[index].id() };
                        console_error(&format!(
                            "!!!Failed to open the {} SUM file for writing!!!\n",
                            id
                        ));
                    }
                    targets.push(None);
                }
            }
        }
        output_base = Some(base_path);
    } else {
        targets = (0..target_count).map(|_| None).collect();
    }
    let mut sink = OutputSink::new(targets);

    if opts.benchmark {
        benchmark::run_benchmark(
            &mut engines,
            opts.benchmark_all,
            opts.quiet,
            opts.clip,
            &mut sink,
        );
        cli::wait_for_exit(opts.no_wait);
        return 0;
    }

    let input = TreePath::new(&opts.input);
    let is_file = match fs::metadata(input.absolute()) {
        Ok(metadata) if metadata.is_file() => true,
        Ok(metadata) if metadata.is_dir() => false,
        _ => {
            return fail(
                &DirSumError::InputNotFound { path: input.absolute().to_path_buf() },
                opts.quiet,
                opts.no_wait,
            )
        }
    };

    if opts.no_follow && paths::is_reparse_point(input.absolute()) {
        return fail(
            &DirSumError::ReparseInput { path: input.absolute().to_path_buf() },
            opts.quiet,
            opts.no_wait,
        );
    }

    if !opts.quiet {
        println!(
            "Using {} to {} {} of \"{}\" ...",
            opts.hash_spec,
            if opts.verify_file.is_some() { "verify" } else { "compute" },
            if opts.sum_mode { "checksum" } else { "hash" },
            if opts.strip_names { paths::leaf_of(&opts.input) } else { opts.input.as_str() }
        );
        let _ = std::io::stdout().flush();
    }

    // the input directory prefix used for relative manifest paths and for
    // re-rooting relative reference entries
    let mut sum_mode = opts.sum_mode;
    let mut dir_prefix = String::new();
    if !is_file && (opts.sum_mode || opts.verify_file.is_some()) {
        dir_prefix = input.display().to_string();
        if opts.include_last_dir {
            match dir_prefix.rfind(MAIN_SEPARATOR) {
                Some(pos) => dir_prefix.truncate(pos + 1),
                None => dir_prefix.clear(),
            }
        } else {
            dir_prefix.push(MAIN_SEPARATOR);
        }
    }

    let mut expectations: Option<SumMap> = None;
    let mut skipped_lines: Vec<usize> = Vec::new();
    let mut single_digest: Option<Vec<u8>> = None;
    let mut reference_path: Option<TreePath> = None;

    if let Some(reference) = &opts.verify_file {
        let reference = TreePath::new(reference);
        match verify::load_reference(
            &reference,
            &input,
            is_file,
            engines[0].digest_size(),
            &dir_prefix,
        ) {
            Ok(Reference::Sum(data)) => {
                expectations = Some(data.entries);
                skipped_lines = data.skipped_lines;
                sum_mode = true;
            }
            Ok(Reference::Single(digest)) => {
                single_digest = Some(digest);
            }
            Err(error) => return fail(&error, opts.quiet, opts.no_wait),
        }
        reference_path = Some(reference);
    }

    let verify_mode = expectations.is_some();
    let mut sum_relative = opts.sum_relative;
    if is_file {
        sum_relative = false;
    }
    let sum_prefix_len = if sum_relative { dir_prefix.len() } else { 0 };

    // a single-file run must not hash its own reference or output file
    if is_file && sum_mode {
        if let Some(reference) = &reference_path {
            if reference.same_absolute_ci(&input) {
                return fail(
                    &DirSumError::SelfCollision { path: input.absolute().to_path_buf() },
                    opts.quiet,
                    opts.no_wait,
                );
            }
        } else if let Some(base) = &output_base {
            if base.same_absolute_ci(&input) {
                return fail(
                    &DirSumError::SelfCollision { path: input.absolute().to_path_buf() },
                    opts.quiet,
                    opts.no_wait,
                );
            }
        }
    }

    let state = Arc::new(RunState::new());
    {
        let handler_state = Arc::clone(&state);
        let _ = ctrlc::set_handler(move || {
            handler_state.fatal.store(true, Ordering::SeqCst);
        });
    }

    let filter = match WalkFilter::new(&opts.only, &opts.exclude, !opts.no_follow) {
        Ok(filter) => filter,
        Err(error) => return fail(&error, opts.quiet, opts.no_wait),
    };

    let self_skip = if !is_file && opts.verify_file.is_some() {
        SelfSkip::new(reference_path.clone())
    } else if !is_file && sum_mode {
        SelfSkip::new(output_base.clone())
    } else {
        SelfSkip::none()
    };

    let scan_opts = ScanOptions {
        quiet: opts.quiet,
        progress: opts.progress,
        hash_names: opts.hash_names,
        strip_names: opts.strip_names,
        skip_errors: opts.skip_errors,
        lowercase: opts.lowercase,
        sum_mode,
        verify_mode,
        sum_prefix_len,
        multi_hash: engines.len() > 1,
    };

    let mut pool_handle: Option<WorkerPool> = None;
    let mut sink_handle: Option<OutputSink> = None;
    if sum_mode && use_threads {
        pool_handle = Some(WorkerPool::start(
            sink,
            Arc::clone(&state),
            PoolOptions {
                skip_errors: opts.skip_errors,
                lowercase: opts.lowercase,
                sum_prefix_len,
                multi_hash: engines.len() > 1,
                verify_mode,
            },
        ));
    } else {
        sink_handle = Some(sink);
    }

    let walk_result;
    let final_expectations: Option<SumMap>;
    {
        let mut hasher = TreeHasher::new(
            &scan_opts,
            &state,
            &filter,
            self_skip,
            engines,
            expectations,
            pool_handle.as_ref(),
            sink_handle.as_mut(),
        );
        walk_result = if is_file {
            hasher.hash_file(&input)
        } else {
            hasher.hash_directory(&input)
        };
        let (walked_engines, walked_expectations) = hasher.finish();
        engines = walked_engines;
        final_expectations = walked_expectations;
    }

    if let Some(pool) = pool_handle.take() {
        if walk_result.is_err() {
            state.fatal.store(true, Ordering::SeqCst);
        }
        sink_handle = Some(pool.drain());
    }
    let mut sink = match sink_handle {
        Some(sink) => sink,
        None => OutputSink::new(Vec::new()),
    };

    if let Err(error) = walk_result {
        return fail(&error, opts.quiet, opts.no_wait);
    }
    if let Some(error) = state.take_last_error() {
        return fail(&error, opts.quiet, opts.no_wait);
    }

    let reference_display =
        reference_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();

    if sum_mode && verify_mode {
        let entries = final_expectations.unwrap_or_default();
        if verify::report_missing_entries(&entries, &reference_display, opts.quiet, &mut sink) {
            state.mismatch.store(true, Ordering::SeqCst);
        }

        let code = if state.mismatch_found() {
            let error = DirSumError::VerificationFailed {
                target: opts.input.clone(),
                reference: reference_display.clone(),
            };
            let message = format!("{}\n", error);
            if !opts.quiet {
                console_error(&message);
            }
            sink.write_message(0, &message);
            error.exit_code()
        } else {
            let message = format!(
                "Verification of \"{}\" against \"{}\" succeeded.\n",
                opts.input, reference_display
            );
            if !opts.quiet {
                console_warn(&message);
            }
            sink.write_message(0, &message);
            0
        };

        verify::report_skipped_lines(&skipped_lines, &reference_display, opts.quiet, &mut sink);

        cli::wait_for_exit(opts.no_wait);
        return code;
    }

    if sum_computation {
        sink.finish_sum_targets(opts.lowercase, opts.quiet);
        cli::wait_for_exit(opts.no_wait);
        return 0;
    }

    if let Some(expected) = single_digest {
        let digest = engines[0].finalize_reset();
        let code = if digest != expected {
            let error = DirSumError::VerificationFailed {
                target: opts.input.clone(),
                reference: reference_display.clone(),
            };
            let message = format!("{}\n", error);
            if !opts.quiet {
                console_error(&message);
            }
            sink.write_message(0, &message);
            error.exit_code()
        } else {
            let message = format!(
                "Verification of \"{}\" against \"{}\" succeeded.\n",
                opts.input, reference_display
            );
            if !opts.quiet {
                console_warn(&message);
            }
            sink.write_message(0, &message);
            0
        };
        cli::wait_for_exit(opts.no_wait);
        return code;
    }

    // aggregate mode: one result line per algorithm, in selector order
    let input_leaf = paths::leaf_of(&opts.input).to_string();
    let count = engines.len();
    for (index, engine) in engines.iter_mut().enumerate() {
        let digest = engine.finalize_reset();
        let digest_hex = hash::to_hex(&digest, opts.lowercase);

        if !opts.quiet {
            sink.write_message(
                0,
                &format!(
                    "{} hash of \"{}\" ({} bytes) = ",
                    engine.id(),
                    input_leaf,
                    engine.digest_size()
                ),
            );
            print!("{} ({} bytes) = ", engine.id(), engine.digest_size());
        }

        console_warn(&digest_hex);
        sink.write_message(0, &digest_hex);

        if opts.clip {
            copy_to_clipboard(&digest_hex);
        }

        if index + 1 < count {
            println!();
            sink.write_message(0, "\n");
        }
    }
    println!();
    sink.write_message(0, "\n");

    cli::wait_for_exit(opts.no_wait);
    0
}
