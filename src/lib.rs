// Library root for dirsum
// Re-exports the building blocks for use in integration tests and by the
// command line binary.

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod output;
pub mod paths;
pub mod pool;
pub mod scan;
pub mod sumfile;
pub mod verify;
pub mod walker;

pub use error::DirSumError;
pub use hash::{parse_hash_spec, HashEngine, SUPPORTED_HASH_IDS};
pub use paths::TreePath;
pub use pool::{RunState, WorkerPool};
pub use scan::{ScanOptions, TreeHasher};
pub use sumfile::{SumEntry, SumMap};
pub use verify::Reference;
pub use walker::{SelfSkip, WalkFilter};
