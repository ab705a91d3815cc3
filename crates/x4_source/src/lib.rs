//! Layered source file resolution for X4 game locations.
//!
//! A game location (the base installation, or one extension folder) provides
//! files from two places: numbered catalogs (`01.cat`, `ext_01.cat`,
//! `subst_01.cat`, ...) and loose files under the game's content folders. This
//! crate merges both into one case-insensitive namespace of virtual paths:
//!
//! - **Catalog discovery**: Finds catalogs by the game's naming and load order
//! - **Loose file discovery**: Indexes files under recognized folders only
//! - **Lazy indexing**: Catalogs are opened and merged on first use, once
//! - **Configurable precedence**: Loose files before or after catalogs
//!
//! Combining several locations into the game's global namespace happens
//! outside this crate.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use x4_source::{Location, ReadOptions, ResolverSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ResolverSettings::load(Utf8Path::new("settings.toml"))?;
//! let base = Location::base("C:/Games/X4 Foundations", settings)?;
//!
//! if let Some(file) = base.read_raw("libraries/jobs.xml", &ReadOptions::new())? {
//!     println!("{} bytes from {}", file.binary.len(), file.source);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod classify;
pub mod error;
pub mod file;
pub mod location;
pub mod loose;
pub mod settings;


// Re-export main types
pub use catalog::{ArchiveOpener, ArchiveReader, CatOpener, CatalogClass};
pub use error::{BoxError, Error, Result};
pub use file::{
    FileConstructor, FileRequest, FileSource, GameFile, GameFileConstructor, GameFileKind,
    ResolvedFile,
};
pub use location::{CatEntryRef, ExtensionSummary, Location, LocationBuilder, ReadOptions};
pub use settings::ResolverSettings;
