//! Error types for heft.
//!
//! One structured error enum covers the whole pipeline; library code
//! propagates with `?` and only the CLI prints and exits.

use thiserror::Error;

/// Main error type for heft operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O errors (the analyzed binary, the dot output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary format parsing errors
    #[error("invalid binary: {0}")]
    InvalidFormat(String),

    /// The demangler child died or misbehaved
    #[error("demangler failed: {0}")]
    Demangler(String),

    /// Reachability or weight pass invoked before `set_entry_point`
    #[error("no entry point has been set")]
    MissingEntryPoint,

    /// The binary ended before a read the symbol table promised
    #[error("short read: wanted {wanted} bytes at offset {offset:#x} but the file ends at {len:#x}")]
    Truncated { offset: u64, wanted: usize, len: u64 },

    /// Hard address lookup on an address no mapping covers
    #[error("no mapping covers address {addr:#x}")]
    AddressNotMapped { addr: u64 },
}

/// Result type alias for heft operations.
pub type Result<T> = std::result::Result<T, Error>;
