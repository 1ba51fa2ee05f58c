// Centralized error handling module
// Every error carries enough context to render the final console message,
// and maps to the distinct process exit code documented in the README.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for dirsum operations.
#[derive(Debug)]
pub enum DirSumError {
    /// Bad command line: unknown flag, conflicting flags, missing value.
    Argument { message: String },

    /// The target path does not resolve to a file or directory.
    InputNotFound { path: PathBuf },

    /// Listing a directory failed and -skipError was not given.
    Enumerate { path: PathBuf, source: io::Error },

    /// Opening a file for reading failed and -skipError was not given.
    Open { path: PathBuf, source: io::Error },

    /// Reading an opened file failed and -skipError was not given.
    Read { path: PathBuf, source: io::Error },

    /// Generic I/O failure with operation context (output files, config).
    Io { operation: String, path: Option<PathBuf>, source: io::Error },

    /// The verification reference could not be parsed as either a
    /// checksum file or a result file.
    ReferenceParse { path: PathBuf },

    /// Digest length in the reference differs from the selected algorithm.
    HashLengthMismatch { reference: usize, selected: usize },

    /// A single-file verification target has no entry in the checksum file.
    EntryNotFound { name: String },

    /// A result file holds no entry usable for the target.
    NoResultEntry { name: String },

    /// At least one digest mismatched or a reference entry was never seen.
    VerificationFailed { target: String, reference: String },

    /// -nofollow was given but the input itself is a reparse point.
    ReparseInput { path: PathBuf },

    /// -verify combined with more than one hash algorithm.
    MultiHashVerify,

    /// The input file is the same as the output or reference file.
    SelfCollision { path: PathBuf },

    /// A control signal interrupted the run.
    Interrupted,
}

impl DirSumError {
    /// Process exit code for this error kind. Each kind is distinct so
    /// callers can tell verification failures from parse failures apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            DirSumError::Argument { .. } | DirSumError::SelfCollision { .. } => 1,
            DirSumError::InputNotFound { .. } => 2,
            DirSumError::ReferenceParse { .. } => 3,
            DirSumError::HashLengthMismatch { .. } => 4,
            DirSumError::EntryNotFound { .. } => 5,
            DirSumError::Enumerate { .. }
            | DirSumError::Open { .. }
            | DirSumError::Read { .. }
            | DirSumError::Io { .. } => 6,
            DirSumError::VerificationFailed { .. } => 7,
            DirSumError::NoResultEntry { .. } => 8,
            DirSumError::ReparseInput { .. } => 9,
            DirSumError::MultiHashVerify => 10,
            DirSumError::Interrupted => 130,
        }
    }

    /// Create an Io error with context about the operation and optional path.
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        DirSumError::Io {
            operation: operation.to_string(),
            path,
            source: err,
        }
    }
}

impl fmt::Display for DirSumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DirSumError::Argument { message } => {
                write!(f, "Error: {}", message)
            }
            DirSumError::InputNotFound { .. } => {
                write!(f, "Error: The given input file doesn't exist")
            }
            DirSumError::Enumerate { path, source } => {
                write!(
                    f,
                    "Failed to list directory \"{}\" ({})",
                    path.display(),
                    source
                )
            }
            DirSumError::Open { path, source } => {
                write!(
                    f,
                    "Failed to open file \"{}\" for reading ({})",
                    path.display(),
                    source
                )
            }
            DirSumError::Read { path, source } => {
                write!(f, "Failed to read file \"{}\" ({})", path.display(), source)
            }
            DirSumError::Io { operation, path, source } => {
                if let Some(p) = path {
                    write!(f, "I/O error while {} \"{}\": {}", operation, p.display(), source)
                } else {
                    write!(f, "I/O error while {}: {}", operation, source)
                }
            }
            DirSumError::ReferenceParse { path } => {
                write!(
                    f,
                    "Error: Failed to parse file \"{}\". Please check that it exists and that its content is valid (either checksum file or result file).",
                    path.display()
                )
            }
            DirSumError::HashLengthMismatch { reference, selected } => {
                write!(
                    f,
                    "Error: hash length parsed from reference file ({} bytes) is different from used hash length ({} bytes).",
                    reference, selected
                )
            }
            DirSumError::EntryNotFound { name } => {
                write!(f, "Error: file \"{}\" not found in checksum file.", name)
            }
            DirSumError::NoResultEntry { name } => {
                write!(
                    f,
                    "Error: Failed to find a valid entry for \"{}\" in the result file",
                    name
                )
            }
            DirSumError::VerificationFailed { target, reference } => {
                write!(
                    f,
                    "Verification of \"{}\" against \"{}\" failed!",
                    target, reference
                )
            }
            DirSumError::ReparseInput { .. } => {
                write!(
                    f,
                    "Error: -nofollow specified but the given input file or directory is a symbolic link, junction point or mount point."
                )
            }
            DirSumError::MultiHashVerify => {
                write!(f, "Error: -verify can not be combined with multiple hash algorithms")
            }
            DirSumError::SelfCollision { path } => {
                write!(
                    f,
                    "Input file \"{}\" is the same as the output or reference file. Aborting!",
                    path.display()
                )
            }
            DirSumError::Interrupted => {
                write!(f, "Interrupted")
            }
        }
    }
}

impl std::error::Error for DirSumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirSumError::Enumerate { source, .. }
            | DirSumError::Open { source, .. }
            | DirSumError::Read { source, .. }
            | DirSumError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
