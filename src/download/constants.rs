//! Constants for the download module (timeouts, chunking, attempt bound).

/// Default HTTP connect timeout (4 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 4;

/// Size of a single body read in the transfer loop.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Default bound on transfer attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Extension given to guessed filenames whose type is not known yet.
pub const PLACEHOLDER_EXTENSION: &str = ".bin";
