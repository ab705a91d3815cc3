//! Catalog discovery and the archive reader seam.
//!
//! X4 finds catalogs by probing numbered names at the root of a location,
//! starting from `01` and stopping at the first gap:
//!
//! ```text
//! base game:   01.cat  02.cat  ...  09.cat
//! extension:   ext_01.cat  ext_02.cat  subst_01.cat
//! ```
//!
//! Extensions use two prefixes. `subst_` catalogs are loaded first and replace
//! game files outright; `ext_` catalogs are loaded next and are applied as
//! patches. Within a class, later numbers override earlier ones. The resulting
//! search order (highest priority first) for an extension is therefore:
//!
//! ```text
//! subst_02.cat, subst_01.cat, ext_02.cat, ext_01.cat
//! ```
//!
//! Reading a catalog goes through [`ArchiveOpener`] and [`ArchiveReader`] so
//! that the location logic does not depend on the `.cat`/`.dat` codec.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::OnceLock;
use x4_cat::CatReader;

/// Catalog index at which discovery gives up and reports a malformed location.
pub const MAX_CATALOG_INDEX: u32 = 100;

/// Precedence class of a catalog, derived from its file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogClass {
    /// `subst_NN.cat`: replaces files on conflict.
    Substitute,
    /// `ext_NN.cat`: patches files on conflict.
    Patch,
    /// `NN.cat`: base game catalogs.
    Base,
}

impl CatalogClass {
    /// File name prefix for this class.
    pub fn prefix(self) -> &'static str {
        match self {
            CatalogClass::Substitute => "subst_",
            CatalogClass::Patch => "ext_",
            CatalogClass::Base => "",
        }
    }

    /// Classes scanned for a location, lowest priority first.
    pub fn scan_order(is_extension: bool) -> &'static [CatalogClass] {
        if is_extension {
            &[CatalogClass::Patch, CatalogClass::Substitute]
        } else {
            &[CatalogClass::Base]
        }
    }

    /// Classify a catalog by its file name. The prefix match is case-sensitive,
    /// like the game's.
    pub fn from_file_name(name: &str) -> Self {
        if name.starts_with(CatalogClass::Substitute.prefix()) {
            CatalogClass::Substitute
        } else if name.starts_with(CatalogClass::Patch.prefix()) {
            CatalogClass::Patch
        } else {
            CatalogClass::Base
        }
    }
}

/// File name of the catalog with the given prefix and index, e.g. `ext_01.cat`.
pub fn catalog_file_name(prefix: &str, index: u32) -> String {
    format!("{}{:02}.cat", prefix, index)
}

/// Find all catalogs at `root`, highest priority first.
///
/// Only existence is checked; no catalog is opened. Returns
/// [`CatalogLimitExceeded`](Error::CatalogLimitExceeded) if a class reaches
/// [`MAX_CATALOG_INDEX`].
pub fn discover_catalogs(root: &Utf8Path, is_extension: bool) -> Result<Vec<Utf8PathBuf>> {
    let mut low_to_high = Vec::new();

    for class in CatalogClass::scan_order(is_extension) {
        let prefix = class.prefix();
        let mut index = 1;
        loop {
            if index >= MAX_CATALOG_INDEX {
                return Err(Error::CatalogLimitExceeded {
                    location: root.to_path_buf(),
                    prefix: prefix.to_string(),
                });
            }

            let cat_path = root.join(catalog_file_name(prefix, index));
            if !cat_path.as_std_path().exists() {
                break;
            }

            tracing::trace!("Found catalog {}", cat_path);
            low_to_high.push(cat_path);
            index += 1;
        }
    }

    low_to_high.reverse();
    Ok(low_to_high)
}

/// Read access to one opened catalog.
///
/// Implementations are held for the lifetime of their [`Location`](crate::Location)
/// and may be shared between threads.
pub trait ArchiveReader: Send + Sync {
    /// All virtual paths in the catalog, lower-cased with forward slashes.
    fn virtual_paths(&self) -> Vec<String>;

    /// Read one entry. Returns `Ok(None)` if the catalog has no such entry.
    ///
    /// When `allow_md5_error` is set, checksum mismatches must be reported as
    /// warnings and the payload returned anyway.
    fn read(&self, virtual_path: &str, allow_md5_error: bool) -> Result<Option<Vec<u8>>>;
}

/// Opens catalogs on first use.
pub trait ArchiveOpener: Send + Sync {
    /// Open the catalog at `cat_path`. Failure is fatal for that catalog.
    fn open(&self, cat_path: &Utf8Path) -> Result<Box<dyn ArchiveReader>>;
}

/// [`ArchiveOpener`] for real `.cat`/`.dat` pairs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatOpener;

impl ArchiveOpener for CatOpener {
    fn open(&self, cat_path: &Utf8Path) -> Result<Box<dyn ArchiveReader>> {
        Ok(Box::new(CatReader::open(cat_path.to_path_buf())?))
    }
}

impl ArchiveReader for CatReader {
    fn virtual_paths(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    fn read(&self, virtual_path: &str, allow_md5_error: bool) -> Result<Option<Vec<u8>>> {
        Ok(CatReader::read(self, virtual_path, allow_md5_error)?)
    }
}

/// A discovered catalog and its reader, opened on first access.
pub(crate) struct CatalogSlot {
    pub(crate) path: Utf8PathBuf,
    pub(crate) reader: OnceLock<Box<dyn ArchiveReader>>,
}

impl CatalogSlot {
    pub(crate) fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            reader: OnceLock::new(),
        }
    }

    /// File name of the catalog, used for prefix filtering.
    pub(crate) fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or("")
    }
}
