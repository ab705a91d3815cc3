//! Error types for catalog reading.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CatError>;

/// Errors that can occur while opening or reading a catalog.
#[derive(Error, Debug)]
pub enum CatError {
    /// Filesystem I/O failed (reading the `.cat` index or the `.dat` payload).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The `.dat` file that should sit next to a `.cat` does not exist.
    #[error("Catalog data file not found: {0}")]
    MissingData(Utf8PathBuf),

    /// A `.cat` line could not be split into `path size timestamp md5`.
    #[error("Malformed catalog line {line} in {cat_path}: '{content}'")]
    MalformedLine {
        cat_path: Utf8PathBuf,
        line: usize,
        content: String,
    },

    /// An entry points past the end of its `.dat` file.
    #[error("Entry '{path}' ({size} bytes at offset {offset}) exceeds {dat_path}")]
    DataOutOfBounds {
        dat_path: Utf8PathBuf,
        path: String,
        offset: u64,
        size: u64,
    },

    /// The MD5 of an entry's payload does not match the catalog.
    #[error("MD5 mismatch for '{path}' in {cat_path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        cat_path: Utf8PathBuf,
        path: String,
        expected: String,
        actual: String,
    },
}
