// Hash computation module
// Hash engine trait, one wrapper per supported algorithm, the algorithm
// registry and the file feeding helpers shared by all modes.

use std::fs::File;
use std::io::{IsTerminal, Read};

use blake2::{Blake2b512, Blake2s256};
use blake3::Hasher as Blake3Hasher;
use indicatif::{ProgressBar, ProgressStyle};
use md5::Md5;
use memmap2::Mmap;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use streebog::Streebog512;

use crate::error::DirSumError;

/// Block size used when streaming file contents into the engines.
pub const BLOCK_SIZE: usize = 4096;

// Files below this size are memory mapped instead of streamed.
const MMAP_THRESHOLD: u64 = 2 * 1024 * 1024 * 1024;

/// The closed set of supported algorithm identifiers, in display order.
pub const SUPPORTED_HASH_IDS: [&str; 9] = [
    "MD5", "SHA1", "SHA256", "SHA384", "SHA512", "Streebog", "Blake2s", "Blake2b", "Blake3",
];

/// A hash computation in progress. Clones are fully independent: updating
/// a clone never affects the engine it was cloned from, which is what lets
/// every worker own its private copy of the selected algorithm set.
pub trait HashEngine: Send {
    /// Canonical identifier, one of [`SUPPORTED_HASH_IDS`].
    fn id(&self) -> &'static str;

    /// Digest size in bytes.
    fn digest_size(&self) -> usize;

    /// Absorb a block of data.
    fn update(&mut self, data: &[u8]);

    /// Produce the digest and reset the engine to its initial state.
    fn finalize_reset(&mut self) -> Vec<u8>;

    /// Independent copy carrying the current intermediate state.
    fn clone_box(&self) -> Box<dyn HashEngine>;
}

// MD5 wrapper
struct Md5Engine(Md5);

impl HashEngine for Md5Engine {
    fn id(&self) -> &'static str {
        "MD5"
    }

    fn digest_size(&self) -> usize {
        16
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Md5::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Md5Engine(self.0.clone()))
    }
}

// SHA-1 wrapper
struct Sha1Engine(Sha1);

impl HashEngine for Sha1Engine {
    fn id(&self) -> &'static str {
        "SHA1"
    }

    fn digest_size(&self) -> usize {
        20
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Sha1::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Sha1Engine(self.0.clone()))
    }
}

// SHA-256 wrapper
struct Sha256Engine(Sha256);

impl HashEngine for Sha256Engine {
    fn id(&self) -> &'static str {
        "SHA256"
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Sha256::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Sha256Engine(self.0.clone()))
    }
}

// SHA-384 wrapper
struct Sha384Engine(Sha384);

impl HashEngine for Sha384Engine {
    fn id(&self) -> &'static str {
        "SHA384"
    }

    fn digest_size(&self) -> usize {
        48
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Sha384::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Sha384Engine(self.0.clone()))
    }
}

// SHA-512 wrapper
struct Sha512Engine(Sha512);

impl HashEngine for Sha512Engine {
    fn id(&self) -> &'static str {
        "SHA512"
    }

    fn digest_size(&self) -> usize {
        64
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Sha512::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Sha512Engine(self.0.clone()))
    }
}

// Streebog (GOST R 34.11-2012, 512-bit) wrapper
struct StreebogEngine(Streebog512);

impl HashEngine for StreebogEngine {
    fn id(&self) -> &'static str {
        "Streebog"
    }

    fn digest_size(&self) -> usize {
        64
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Streebog512::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(StreebogEngine(self.0.clone()))
    }
}

// BLAKE2s-256 wrapper
struct Blake2sEngine(Blake2s256);

impl HashEngine for Blake2sEngine {
    fn id(&self) -> &'static str {
        "Blake2s"
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Blake2s256::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Blake2sEngine(self.0.clone()))
    }
}

// BLAKE2b-512 wrapper
struct Blake2bEngine(Blake2b512);

impl HashEngine for Blake2bEngine {
    fn id(&self) -> &'static str {
        "Blake2b"
    }

    fn digest_size(&self) -> usize {
        64
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Digest::finalize(std::mem::replace(&mut self.0, Blake2b512::new())).to_vec()
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Blake2bEngine(self.0.clone()))
    }
}

// BLAKE3 wrapper
struct Blake3Engine(Blake3Hasher);

impl HashEngine for Blake3Engine {
    fn id(&self) -> &'static str {
        "Blake3"
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        let digest = self.0.finalize().as_bytes().to_vec();
        self.0.reset();
        digest
    }

    fn clone_box(&self) -> Box<dyn HashEngine> {
        Box::new(Blake3Engine(self.0.clone()))
    }
}

/// Get a fresh engine for the given identifier, matched case-insensitively.
pub fn engine_for(id: &str) -> Option<Box<dyn HashEngine>> {
    if id.eq_ignore_ascii_case("MD5") {
        Some(Box::new(Md5Engine(Md5::new())))
    } else if id.eq_ignore_ascii_case("SHA1") {
        Some(Box::new(Sha1Engine(Sha1::new())))
    } else if id.eq_ignore_ascii_case("SHA256") {
        Some(Box::new(Sha256Engine(Sha256::new())))
    } else if id.eq_ignore_ascii_case("SHA384") {
        Some(Box::new(Sha384Engine(Sha384::new())))
    } else if id.eq_ignore_ascii_case("SHA512") {
        Some(Box::new(Sha512Engine(Sha512::new())))
    } else if id.eq_ignore_ascii_case("Streebog") {
        Some(Box::new(StreebogEngine(Streebog512::new())))
    } else if id.eq_ignore_ascii_case("Blake2s") {
        Some(Box::new(Blake2sEngine(Blake2s256::new())))
    } else if id.eq_ignore_ascii_case("Blake2b") {
        Some(Box::new(Blake2bEngine(Blake2b512::new())))
    } else if id.eq_ignore_ascii_case("Blake3") {
        Some(Box::new(Blake3Engine(Blake3Hasher::new())))
    } else {
        None
    }
}

/// Check whether a string is a supported algorithm identifier.
pub fn is_hash_id(id: &str) -> bool {
    SUPPORTED_HASH_IDS.iter().any(|s| s.eq_ignore_ascii_case(id))
}

/// Check whether a string is a single identifier or a comma separated
/// combination of identifiers, e.g. "SHA512" or "SHA1,MD5,Blake3".
/// A trailing comma or an empty segment makes the whole string invalid.
pub fn is_hash_id_combination(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    text.split(',').all(is_hash_id)
}

/// Digest sizes the on-disk formats accept.
pub fn is_digest_size(size: usize) -> bool {
    matches!(size, 16 | 20 | 32 | 48 | 64)
}

/// Parse a user supplied algorithm selector into an ordered engine list.
/// Order is preserved; empty segments and unknown identifiers are fatal
/// argument errors.
pub fn parse_hash_spec(text: &str) -> Result<Vec<Box<dyn HashEngine>>, DirSumError> {
    let mut engines = Vec::new();
    for part in text.split(',') {
        match engine_for(part) {
            Some(engine) => engines.push(engine),
            None => {
                return Err(DirSumError::Argument {
                    message: format!(
                        "Failed to initialize the hash algorithm(s) \"{}\"",
                        text
                    ),
                })
            }
        }
    }
    Ok(engines)
}

/// Clone every engine in the list, preserving intermediate state.
pub fn clone_engines(engines: &[Box<dyn HashEngine>]) -> Vec<Box<dyn HashEngine>> {
    engines.iter().map(|e| e.clone_box()).collect()
}

/// Feed one block into every engine.
pub fn update_engines(engines: &mut [Box<dyn HashEngine>], data: &[u8]) {
    for engine in engines.iter_mut() {
        engine.update(data);
    }
}

/// Feed a string into every engine as UTF-16 little-endian code units.
/// This is the encoding used for path names in the aggregate digest.
pub fn update_engines_utf16(engines: &mut [Box<dyn HashEngine>], text: &str) {
    let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    update_engines(engines, &bytes);
}

/// Hex-encode a digest, uppercase by default.
pub fn to_hex(digest: &[u8], lowercase: bool) -> String {
    if lowercase {
        hex::encode(digest)
    } else {
        hex::encode_upper(digest)
    }
}

/// Decode a hex string, accepting either case. Returns None on odd length
/// or non-hex characters.
pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    hex::decode(text).ok()
}

/// Stream the contents of an open file into every engine.
///
/// Regular files below 2 GiB are memory mapped and absorbed in one update;
/// larger files and the progress-bar path fall back to 4 KiB block reads.
/// The mapped and streamed paths produce identical digests.
pub fn feed_file(
    engines: &mut [Box<dyn HashEngine>],
    file: &mut File,
    file_size: u64,
    display_name: &str,
    show_progress: bool,
) -> std::io::Result<()> {
    let show_progress = show_progress && std::io::stdout().is_terminal();

    if !show_progress && file_size > 0 && file_size < MMAP_THRESHOLD {
        if let Ok(mmap) = unsafe { Mmap::map(&*file) } {
            update_engines(engines, &mmap[..]);
            return Ok(());
        }
        // fall through to buffered reads if mapping fails
    }

    let mut buffer = [0u8; BLOCK_SIZE];
    let mut current: u64 = 0;

    let bar = if show_progress {
        let bar = ProgressBar::new(file_size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:10}] {percent} % ({bytes}/{total_bytes})")
                .unwrap()
                .progress_chars("== "),
        );
        bar.set_message(display_name.to_string());
        Some(bar)
    } else {
        None
    };

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        current += count as u64;
        update_engines(engines, &buffer[..count]);
        if let Some(ref bar) = bar {
            bar.set_position(current);
        }
        if current >= file_size {
            break;
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    Ok(())
}
