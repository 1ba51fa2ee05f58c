// Benchmark module
// In-memory throughput measurement of the selected algorithms.

use std::time::Instant;

use crate::hash::{self, HashEngine};
use crate::output::{console_warn, copy_to_clipboard, OutputSink};

const BENCH_BUFFER_SIZE: usize = 50 * 1024 * 1024;
const BENCH_LOOPS: usize = 50;

/// Measure one engine over a fixed in-memory buffer. Returns bytes per
/// second.
fn measure(engine: &mut dyn HashEngine, buffer: &[u8]) -> f64 {
    let start = Instant::now();
    for _ in 0..BENCH_LOOPS {
        engine.update(buffer);
        engine.finalize_reset();
    }
    let elapsed = start.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        (buffer.len() as f64 * BENCH_LOOPS as f64) / elapsed
    } else {
        f64::INFINITY
    }
}

fn format_speed(id: &str, speed: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    if speed >= GIB {
        format!("{} speed = {:.2} GiB/s", id, speed / GIB)
    } else if speed >= MIB {
        format!("{} speed = {:.2} MiB/s", id, speed / MIB)
    } else if speed >= KIB {
        format!("{} speed = {:.2} KiB/s", id, speed / KIB)
    } else {
        format!("{} speed = {:.2} B/s", id, speed)
    }
}

/// Benchmark the selected algorithms, or all of them when `all` is set.
/// Results go to the console (yellow), the output file when one was
/// requested, and optionally the clipboard.
pub fn run_benchmark(
    engines: &mut [Box<dyn HashEngine>],
    all: bool,
    quiet: bool,
    clip: bool,
    sink: &mut OutputSink,
) {
    let buffer = vec![0u8; BENCH_BUFFER_SIZE];
    let mut clip_text = String::new();

    let mut selected: Vec<Box<dyn HashEngine>>;
    let engines: &mut [Box<dyn HashEngine>] = if all {
        selected = hash::SUPPORTED_HASH_IDS
            .iter()
            .filter_map(|id| hash::engine_for(id))
            .collect();
        &mut selected
    } else {
        engines
    };

    for engine in engines.iter_mut() {
        let speed = measure(engine.as_mut(), &buffer);
        let line = format_speed(engine.id(), speed);
        if !quiet {
            console_warn(&format!("{}\n", line));
        }
        sink.write_message(0, &format!("{}\n", line));
        if clip {
            clip_text.push_str(&line);
            clip_text.push('\n');
        }
    }

    if clip {
        copy_to_clipboard(&clip_text);
    }
}
