//! Error types for source resolution.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. Catalog, filesystem and settings errors are converted via
//! `From` impls.

use crate::file::FileSource;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by external collaborators such as
/// [`FileConstructor`](crate::file::FileConstructor).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while discovering or reading source files.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed (reading a loose file, listing a folder, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Recursive directory walk failed during loose file discovery.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Error from the `x4_cat` crate when opening or reading a catalog,
    /// including MD5 mismatches that were not suppressed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] x4_cat::CatError),

    /// Resolver settings could not be parsed.
    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    /// Catalog numbering reached the sanity bound, which means the location
    /// directory is malformed.
    #[error("Catalog scan for prefix '{prefix}' in {location} reached index 100")]
    CatalogLimitExceeded {
        location: Utf8PathBuf,
        prefix: String,
    },

    /// A catalog passed to [`Location::add_catalog`](crate::Location::add_catalog)
    /// does not exist.
    #[error("Catalog file not found: {0}")]
    CatalogNotFound(Utf8PathBuf),

    /// A catalog path that this location does not know about.
    #[error("Catalog is not registered with this location: {0}")]
    UnknownCatalog(Utf8PathBuf),

    /// No loose file or catalog entry matched, and the caller asked for strict mode.
    #[error("Could not find a match for file {virtual_path}")]
    FileMissing { virtual_path: String },

    /// The file was found, but turning its contents into a game file failed.
    #[error("Error when parsing file \"{virtual_path}\" from \"{source_path}\": {source}")]
    FileLoading {
        virtual_path: String,
        source_path: FileSource,
        #[source]
        source: BoxError,
    },
}
