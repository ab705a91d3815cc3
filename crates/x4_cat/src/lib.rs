//! Reader for X4 catalog archives.
//!
//! X4 ships its content as numbered `.cat`/`.dat` pairs (`01.cat`, `ext_01.cat`,
//! `subst_01.cat`, ...). This crate parses the `.cat` index and extracts
//! individual entries from the `.dat`, verifying their MD5 checksums.
//!
//! # Example
//!
//! ```no_run
//! use x4_cat::CatReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = CatReader::open("C:/Games/X4 Foundations/01.cat")?;
//! if let Some(bytes) = reader.read("libraries/jobs.xml", false)? {
//!     println!("jobs.xml is {} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reader;

pub use error::{CatError, Result};
pub use reader::{normalize_path, CatEntry, CatReader};
