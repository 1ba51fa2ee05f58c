// Worker pool module
// Fixed-size pool hashing one file per job, plus a single serialiser
// thread that owns every write to the output targets. Workers never touch
// file handles other than the one file they are hashing.

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::DirSumError;
use crate::hash::{HashEngine, BLOCK_SIZE};
use crate::output::{console_error, console_warn, OutputSink};
use crate::paths::TreePath;
use crate::sumfile;

// Hard cap on worker threads, far above anything a real host exposes.
const MAX_WORKERS: usize = 256;

// Poll interval for the cancellation flag while blocked on a channel.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Flags shared by every thread in a run. Both booleans only ever move
/// from false to true.
pub struct RunState {
    pub mismatch: AtomicBool,
    pub fatal: AtomicBool,
    last_error: Mutex<Option<DirSumError>>,
}

impl RunState {
    pub fn new() -> RunState {
        RunState {
            mismatch: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn mismatch_found(&self) -> bool {
        self.mismatch.load(Ordering::SeqCst)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    /// Record a fatal per-file error and stop the run.
    pub fn record_fatal(&self, error: DirSumError) {
        let mut slot = self.last_error.lock().unwrap();
        *slot = Some(error);
        self.fatal.store(true, Ordering::SeqCst);
    }

    pub fn take_last_error(&self) -> Option<DirSumError> {
        self.last_error.lock().unwrap().take()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// One file to hash. The engine clones are owned by the job, so workers
/// share no hash state.
pub struct Job {
    pub path: TreePath,
    pub file_size: u64,
    pub engines: Vec<Box<dyn HashEngine>>,
    pub expected: Option<Vec<u8>>,
    pub quiet: bool,
}

/// One unit of output handed to the serialiser.
pub struct OutputItem {
    pub text: String,
    pub console_text: Option<String>,
    pub quiet: bool,
    pub is_error: bool,
    /// Target file slot, or None for console-only messages.
    pub file_index: Option<usize>,
    /// Manifest lines go through the shadow file; messages do not.
    pub is_sum_line: bool,
}

/// Behaviour shared by all workers in a run.
pub struct PoolOptions {
    pub skip_errors: bool,
    pub lowercase: bool,
    pub sum_prefix_len: usize,
    pub multi_hash: bool,
    pub verify_mode: bool,
}

/// Worker threads plus the output serialiser. Dropping the senders is the
/// shutdown signal; `drain` returns the sink once everything joined.
pub struct WorkerPool {
    job_tx: Sender<Job>,
    output_tx: Sender<OutputItem>,
    workers: Vec<JoinHandle<()>>,
    serializer: JoinHandle<OutputSink>,
}

/// Number of workers a pool would start: one per logical CPU capped at
/// 256, or zero on a single-CPU host where threading buys nothing.
pub fn worker_count() -> usize {
    let cpus = num_cpus::get();
    if cpus <= 1 {
        0
    } else {
        cpus.min(MAX_WORKERS)
    }
}

impl WorkerPool {
    pub fn start(sink: OutputSink, state: Arc<RunState>, options: PoolOptions) -> WorkerPool {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (output_tx, output_rx) = unbounded::<OutputItem>();
        let options = Arc::new(options);

        let mut workers = Vec::new();
        for _ in 0..worker_count().max(1) {
            let jobs = job_rx.clone();
            let outputs = output_tx.clone();
            let state = Arc::clone(&state);
            let options = Arc::clone(&options);
            workers.push(thread::spawn(move || {
                worker_loop(jobs, outputs, state, options);
            }));
        }

        let serializer_state = Arc::clone(&state);
        let serializer = thread::spawn(move || serializer_loop(output_rx, sink, serializer_state));

        WorkerPool { job_tx, output_tx, workers, serializer }
    }

    pub fn submit(&self, job: Job) {
        let _ = self.job_tx.send(job);
    }

    /// Queue a message from the main thread through the serialiser so the
    /// single-writer invariant on the output files holds.
    pub fn push_output(&self, item: OutputItem) {
        let _ = self.output_tx.send(item);
    }

    /// Close the queues, wait for every worker and the serialiser, and get
    /// the output sink back.
    pub fn drain(self) -> OutputSink {
        drop(self.job_tx);
        for worker in self.workers {
            let _ = worker.join();
        }
        drop(self.output_tx);
        self.serializer
            .join()
            .unwrap_or_else(|_| panic!("output serialiser thread panicked"))
    }
}

fn worker_loop(
    jobs: Receiver<Job>,
    outputs: Sender<OutputItem>,
    state: Arc<RunState>,
    options: Arc<PoolOptions>,
) {
    let mut buffer = [0u8; BLOCK_SIZE];

    loop {
        if state.is_fatal() {
            break;
        }
        match jobs.recv_timeout(POLL_INTERVAL) {
            Ok(job) => process_job(job, &mut buffer, &outputs, &state, &options),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn process_job(
    mut job: Job,
    buffer: &mut [u8],
    outputs: &Sender<OutputItem>,
    state: &RunState,
    options: &PoolOptions,
) {
    let mut file = match File::open(job.path.absolute()) {
        Ok(file) => file,
        Err(e) => {
            stream_failure(
                format!(
                    "Failed to open file \"{}\" for reading ({})\n",
                    job.path.display(),
                    e
                ),
                DirSumError::Open { path: job.path.absolute().to_path_buf(), source: e },
                job.quiet,
                outputs,
                state,
                options,
            );
            return;
        }
    };

    let mut current: u64 = 0;
    loop {
        match file.read(buffer) {
            Ok(0) => break,
            Ok(count) => {
                current += count as u64;
                for engine in job.engines.iter_mut() {
                    engine.update(&buffer[..count]);
                }
                if current >= job.file_size {
                    break;
                }
            }
            Err(e) => {
                stream_failure(
                    format!("Failed to read file \"{}\" ({})\n", job.path.display(), e),
                    DirSumError::Read { path: job.path.absolute().to_path_buf(), source: e },
                    job.quiet,
                    outputs,
                    state,
                    options,
                );
                return;
            }
        }
        if state.is_fatal() {
            return;
        }
    }

    match job.expected.take() {
        Some(expected) => {
            let digest = job.engines[0].finalize_reset();
            if digest != expected {
                state.mismatch.store(true, Ordering::SeqCst);
                let _ = outputs.send(OutputItem {
                    text: format!("Hash value mismatch for \"{}\"\n", job.path.display()),
                    console_text: None,
                    quiet: job.quiet,
                    is_error: false,
                    file_index: Some(0),
                    is_sum_line: false,
                });
            }
        }
        None => {
            let display = job.path.display();
            let written = display.get(options.sum_prefix_len..).unwrap_or(display);
            for (index, engine) in job.engines.iter_mut().enumerate() {
                let digest = engine.finalize_reset();
                let line = sumfile::format_sum_line(&digest, written, options.lowercase);
                let console_text = if options.multi_hash && !job.quiet {
                    Some(format!("{}: {}", engine.id(), line))
                } else {
                    None
                };
                let _ = outputs.send(OutputItem {
                    text: line,
                    console_text,
                    quiet: job.quiet,
                    is_error: false,
                    file_index: Some(index),
                    is_sum_line: true,
                });
            }
        }
    }
}

fn stream_failure(
    message: String,
    error: DirSumError,
    quiet: bool,
    outputs: &Sender<OutputItem>,
    state: &RunState,
    options: &PoolOptions,
) {
    let file_index = if options.verify_mode { Some(0) } else { None };
    if options.skip_errors {
        let _ = outputs.send(OutputItem {
            text: message,
            console_text: None,
            quiet,
            is_error: true,
            file_index,
            is_sum_line: false,
        });
        state.mismatch.store(true, Ordering::SeqCst);
    } else {
        let _ = outputs.send(OutputItem {
            text: message,
            console_text: None,
            quiet: true,
            is_error: true,
            file_index,
            is_sum_line: false,
        });
        state.record_fatal(error);
    }
}

fn serializer_loop(
    outputs: Receiver<OutputItem>,
    mut sink: OutputSink,
    state: Arc<RunState>,
) -> OutputSink {
    loop {
        if state.is_fatal() {
            break;
        }
        match outputs.recv_timeout(POLL_INTERVAL) {
            Ok(item) => write_item(&mut sink, item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    sink
}

fn write_item(sink: &mut OutputSink, item: OutputItem) {
    if !item.quiet {
        let text = item.console_text.as_deref().unwrap_or(&item.text);
        if item.is_error {
            console_error(text);
        } else {
            console_warn(text);
        }
    }
    if let Some(index) = item.file_index {
        if item.is_sum_line {
            sink.write_sum_line_text(index, &item.text);
        } else {
            sink.write_message(index, &item.text);
        }
    }
}
