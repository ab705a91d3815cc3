//! Per-location source resolution.
//!
//! A [`Location`] is one precedence layer: the base game folder, or a single
//! extension folder. It merges two kinds of sources into one namespace of
//! virtual paths:
//!
//! 1. **Catalogs** found by [`discover_catalogs`], searched in priority order.
//! 2. **Loose files** found by [`find_loose_files`] under recognized folders.
//!
//! Which of the two wins is decided by
//! [`ResolverSettings::prefer_loose_files`]. Discovery runs once at
//! construction; catalogs are opened on first use, and the merged catalog
//! entry index and the virtual path set are built lazily and kept for the life
//! of the location. The directory tree is assumed not to change while a
//! location is alive.

use crate::catalog::{discover_catalogs, ArchiveOpener, ArchiveReader, CatOpener, CatalogSlot};
use crate::error::{Error, Result};
use crate::file::{
    FileConstructor, FileRequest, FileSource, GameFile, GameFileConstructor, ResolvedFile,
};
use crate::loose::find_loose_files;
use crate::settings::ResolverSettings;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Identity of the extension a location belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSummary {
    /// Name of the folder holding the extension.
    pub extension_name: String,
    /// Human-readable name from the extension's `content.xml`, if known.
    pub display_name: Option<String>,
}

impl ExtensionSummary {
    pub fn new(extension_name: impl Into<String>) -> Self {
        Self {
            extension_name: extension_name.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Display name if known, otherwise the folder name.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.extension_name)
    }
}

/// Per-read options for [`Location::read`].
///
/// The default searches loose files and all catalogs, returns `None` for
/// missing files and treats MD5 mismatches as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Search loose files as well as catalogs.
    pub include_loose_files: bool,
    /// Only search catalogs whose file name starts with this, e.g. `"subst_"`.
    pub cat_prefix: Option<String>,
    /// Fail with [`Error::FileMissing`] instead of returning `None`.
    pub error_if_missing: bool,
    /// Return catalog payloads even if their MD5 does not match.
    pub allow_md5_error: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            include_loose_files: true,
            cat_prefix: None,
            error_if_missing: false,
            allow_md5_error: false,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip loose files.
    pub fn catalogs_only(mut self) -> Self {
        self.include_loose_files = false;
        self
    }

    pub fn cat_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cat_prefix = Some(prefix.into());
        self
    }

    pub fn error_if_missing(mut self) -> Self {
        self.error_if_missing = true;
        self
    }

    pub fn allow_md5_error(mut self) -> Self {
        self.allow_md5_error = true;
        self
    }
}

/// Where the winning copy of a catalog entry lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatEntryRef {
    /// Catalog holding the entry.
    pub cat_path: Utf8PathBuf,
    /// Position of the catalog in priority order (0 is highest).
    pub priority: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMethod {
    Loose,
    Catalog,
}

/// Configures and constructs a [`Location`].
///
/// Construction runs catalog and loose file discovery immediately.
pub struct LocationBuilder {
    root: Option<Utf8PathBuf>,
    extension: Option<ExtensionSummary>,
    is_extension: Option<bool>,
    settings: ResolverSettings,
    opener: Arc<dyn ArchiveOpener>,
}

impl Default for LocationBuilder {
    fn default() -> Self {
        Self {
            root: None,
            extension: None,
            is_extension: None,
            settings: ResolverSettings::default(),
            opener: Arc::new(CatOpener),
        }
    }
}

impl LocationBuilder {
    /// Folder to discover catalogs and loose files in. Without a root the
    /// location starts empty.
    pub fn root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Mark the location as an extension. Implies `is_extension(true)` unless
    /// overridden.
    pub fn extension(mut self, summary: ExtensionSummary) -> Self {
        self.extension = Some(summary);
        self
    }

    /// Set the extension flag explicitly, for when no summary is available.
    pub fn is_extension(mut self, is_extension: bool) -> Self {
        self.is_extension = Some(is_extension);
        self
    }

    pub fn settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the catalog opener (defaults to [`CatOpener`]).
    pub fn opener(mut self, opener: Arc<dyn ArchiveOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Run discovery and build the location.
    ///
    /// Fails if catalog discovery hits its sanity bound or the root cannot be
    /// listed.
    pub fn build(self) -> Result<Location> {
        let is_extension = self.is_extension.unwrap_or(self.extension.is_some());
        let folder_name_lower = self
            .root
            .as_deref()
            .and_then(Utf8Path::file_name)
            .map(str::to_lowercase);

        let (catalogs, loose_files) = match &self.root {
            Some(root) => {
                let catalogs = discover_catalogs(root, is_extension)?;
                let loose_files = find_loose_files(root, is_extension)?;
                tracing::info!(
                    "Location {} ({}): {} catalogs, {} loose files",
                    root,
                    self.extension
                        .as_ref()
                        .map_or("base", ExtensionSummary::name),
                    catalogs.len(),
                    loose_files.len()
                );
                (catalogs, loose_files)
            }
            None => (Vec::new(), HashMap::new()),
        };

        Ok(Location {
            root: self.root,
            folder_name_lower,
            is_extension,
            extension: self.extension,
            settings: self.settings,
            opener: self.opener,
            catalogs: catalogs.into_iter().map(CatalogSlot::new).collect(),
            loose_files,
            cat_entries: OnceLock::new(),
            virtual_paths: OnceLock::new(),
            open_lock: Mutex::new(()),
            index_lock: Mutex::new(()),
        })
    }
}

/// Source files available at one location.
///
/// All virtual paths handled here are relative to the location; prefixing
/// extension files into the global namespace is up to the caller.
pub struct Location {
    root: Option<Utf8PathBuf>,
    folder_name_lower: Option<String>,
    is_extension: bool,
    extension: Option<ExtensionSummary>,
    settings: ResolverSettings,
    opener: Arc<dyn ArchiveOpener>,

    /// Catalogs in priority order, highest first.
    catalogs: Vec<CatalogSlot>,

    /// Lower-cased virtual path -> loose file path with on-disk casing.
    loose_files: HashMap<String, Utf8PathBuf>,

    /// Virtual path -> highest priority catalog holding it.
    cat_entries: OnceLock<HashMap<String, CatEntryRef>>,

    /// Union of loose file and catalog virtual paths.
    virtual_paths: OnceLock<HashSet<String>>,

    // Serialize fallible lazy initialization so each catalog is opened once
    // and the entry index is built once.
    open_lock: Mutex<()>,
    index_lock: Mutex<()>,
}

impl Location {
    pub fn builder() -> LocationBuilder {
        LocationBuilder::default()
    }

    /// Location for the base game installation at `root`.
    pub fn base(root: impl Into<Utf8PathBuf>, settings: ResolverSettings) -> Result<Self> {
        Self::builder().root(root).settings(settings).build()
    }

    /// Location for the extension at `root`.
    pub fn extension(
        root: impl Into<Utf8PathBuf>,
        summary: ExtensionSummary,
        settings: ResolverSettings,
    ) -> Result<Self> {
        Self::builder()
            .root(root)
            .extension(summary)
            .settings(settings)
            .build()
    }

    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    /// Lower-cased name of the root folder, used to order extensions.
    pub fn folder_name_lower(&self) -> Option<&str> {
        self.folder_name_lower.as_deref()
    }

    pub fn is_extension(&self) -> bool {
        self.is_extension
    }

    pub fn extension_summary(&self) -> Option<&ExtensionSummary> {
        self.extension.as_ref()
    }

    pub fn extension_name(&self) -> Option<&str> {
        self.extension.as_ref().map(|e| e.extension_name.as_str())
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Catalog paths in priority order, highest first.
    pub fn catalog_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.catalogs.iter().map(|slot| slot.path.as_path())
    }

    /// Append a catalog at the lowest priority.
    ///
    /// Used for catalogs supplied by the caller rather than discovered. Adding
    /// a catalog that is already registered does nothing. Cached indexes are
    /// dropped so the next query includes the new catalog; existing catalogs
    /// keep their priority.
    pub fn add_catalog(&mut self, cat_path: impl Into<Utf8PathBuf>) -> Result<()> {
        let cat_path = cat_path.into();
        if !cat_path.as_std_path().is_file() {
            return Err(Error::CatalogNotFound(cat_path));
        }
        if self.catalogs.iter().any(|slot| slot.path == cat_path) {
            return Ok(());
        }

        tracing::debug!("Adding low priority catalog {}", cat_path);
        self.catalogs.push(CatalogSlot::new(cat_path));
        self.cat_entries.take();
        self.virtual_paths.take();
        Ok(())
    }

    /// Reader for a registered catalog, opening it if needed.
    pub fn catalog_reader(&self, cat_path: &Utf8Path) -> Result<&dyn ArchiveReader> {
        let slot = self
            .catalogs
            .iter()
            .find(|slot| slot.path.as_path() == cat_path)
            .ok_or_else(|| Error::UnknownCatalog(cat_path.to_path_buf()))?;
        self.slot_reader(slot)
    }

    fn slot_reader<'a>(&'a self, slot: &'a CatalogSlot) -> Result<&'a dyn ArchiveReader> {
        if let Some(reader) = slot.reader.get() {
            return Ok(reader.as_ref());
        }

        let _guard = self.open_lock.lock();
        if let Some(reader) = slot.reader.get() {
            return Ok(reader.as_ref());
        }

        tracing::debug!("Opening catalog {}", slot.path);
        let reader = self.opener.open(&slot.path)?;
        Ok(slot.reader.get_or_init(|| reader).as_ref())
    }

    /// Loose files, keyed by lower-cased virtual path.
    pub fn loose_files(&self) -> &HashMap<String, Utf8PathBuf> {
        &self.loose_files
    }

    /// Catalog entries from all catalogs, keeping the highest priority copy
    /// of each virtual path. Opens every catalog on first call.
    pub fn cat_entries(&self) -> Result<&HashMap<String, CatEntryRef>> {
        if let Some(entries) = self.cat_entries.get() {
            return Ok(entries);
        }

        let _guard = self.index_lock.lock();
        if let Some(entries) = self.cat_entries.get() {
            return Ok(entries);
        }

        let mut entries = HashMap::new();
        for (priority, slot) in self.catalogs.iter().enumerate() {
            let reader = self.slot_reader(slot)?;
            for virtual_path in reader.virtual_paths() {
                // Earlier catalogs have higher priority; keep the first seen.
                entries.entry(virtual_path).or_insert_with(|| CatEntryRef {
                    cat_path: slot.path.clone(),
                    priority,
                });
            }
        }

        tracing::debug!(
            "Indexed {} catalog entries from {} catalogs",
            entries.len(),
            self.catalogs.len()
        );
        Ok(self.cat_entries.get_or_init(|| entries))
    }

    /// All virtual paths at this location, from loose files and catalogs.
    pub fn virtual_paths(&self) -> Result<&HashSet<String>> {
        if let Some(paths) = self.virtual_paths.get() {
            return Ok(paths);
        }

        let cat_entries = self.cat_entries()?;
        Ok(self.virtual_paths.get_or_init(|| {
            self.loose_files
                .keys()
                .chain(cat_entries.keys())
                .cloned()
                .collect()
        }))
    }

    /// Read a catalog entry through its index reference.
    pub fn read_cat_entry(
        &self,
        entry: &CatEntryRef,
        virtual_path: &str,
        allow_md5_error: bool,
    ) -> Result<Option<Vec<u8>>> {
        let slot = self
            .catalogs
            .get(entry.priority)
            .filter(|slot| slot.path == entry.cat_path)
            .ok_or_else(|| Error::UnknownCatalog(entry.cat_path.clone()))?;
        self.slot_reader(slot)?
            .read(&normalize_virtual_path(virtual_path), allow_md5_error)
    }

    /// Read a loose file. `virtual_path` must already be lower case.
    pub fn read_loose_file(&self, virtual_path: &str) -> Result<Option<ResolvedFile>> {
        let Some(path) = self.loose_files.get(virtual_path) else {
            return Ok(None);
        };

        let binary = std::fs::read(path.as_std_path())?;
        Ok(Some(ResolvedFile {
            source: FileSource::Loose(path.clone()),
            binary,
        }))
    }

    /// Search catalogs in priority order for `virtual_path`, optionally only
    /// those whose file name starts with `cat_prefix`. `virtual_path` must
    /// already be lower case.
    pub fn read_catalog_file(
        &self,
        virtual_path: &str,
        cat_prefix: Option<&str>,
        allow_md5_error: bool,
    ) -> Result<Option<ResolvedFile>> {
        for slot in &self.catalogs {
            if let Some(prefix) = cat_prefix {
                if !slot.file_name().starts_with(prefix) {
                    continue;
                }
            }

            let reader = self.slot_reader(slot)?;
            if let Some(binary) = reader.read(virtual_path, allow_md5_error)? {
                return Ok(Some(ResolvedFile {
                    source: FileSource::Catalog(slot.path.clone()),
                    binary,
                }));
            }
        }

        Ok(None)
    }

    fn method_order(&self, include_loose_files: bool) -> Vec<ReadMethod> {
        let order = if self.settings.prefer_loose_files {
            [ReadMethod::Loose, ReadMethod::Catalog]
        } else {
            [ReadMethod::Catalog, ReadMethod::Loose]
        };

        order
            .into_iter()
            .filter(|method| include_loose_files || *method != ReadMethod::Loose)
            .collect()
    }

    /// Resolve `virtual_path` to its payload and provenance.
    ///
    /// The path is matched case-insensitively. Loose files and catalogs are
    /// tried in the order set by the location's settings, and the first to
    /// return a payload wins; an empty payload still counts as found.
    /// Returns `Ok(None)` if nothing matched, or [`Error::FileMissing`] when
    /// `options.error_if_missing` is set.
    pub fn read_raw(
        &self,
        virtual_path: &str,
        options: &ReadOptions,
    ) -> Result<Option<ResolvedFile>> {
        let virtual_path = normalize_virtual_path(virtual_path);
        let allow_md5_error = options.allow_md5_error || self.settings.allow_cat_md5_errors;

        for method in self.method_order(options.include_loose_files) {
            let found = match method {
                ReadMethod::Loose => self.read_loose_file(&virtual_path)?,
                ReadMethod::Catalog => self.read_catalog_file(
                    &virtual_path,
                    options.cat_prefix.as_deref(),
                    allow_md5_error,
                )?,
            };

            if let Some(file) = found {
                if self.settings.log_source_paths {
                    tracing::info!("Loaded file \"{}\" from \"{}\"", virtual_path, file.source);
                } else {
                    tracing::debug!("Loaded file \"{}\" from \"{}\"", virtual_path, file.source);
                }
                return Ok(Some(file));
            }
        }

        if options.error_if_missing {
            return Err(Error::FileMissing { virtual_path });
        }
        Ok(None)
    }

    /// Resolve `virtual_path` and build a typed file from it.
    ///
    /// Returns `Ok(None)` if the file was not found (in lenient mode) or was
    /// found but empty. Errors from `constructor` are wrapped in
    /// [`Error::FileLoading`] with the virtual path and source attached.
    pub fn read<C: FileConstructor>(
        &self,
        virtual_path: &str,
        options: &ReadOptions,
        constructor: &C,
    ) -> Result<Option<C::Output>> {
        let Some(ResolvedFile { source, binary }) = self.read_raw(virtual_path, options)? else {
            return Ok(None);
        };

        let virtual_path = normalize_virtual_path(virtual_path);
        if binary.is_empty() {
            tracing::debug!("File \"{}\" from \"{}\" is empty", virtual_path, source);
            return Ok(None);
        }

        let request = FileRequest {
            binary,
            virtual_path: &virtual_path,
            source: &source,
            from_source: true,
            extension_name: self.extension_name(),
        };

        match constructor.construct(request) {
            Ok(file) => Ok(Some(file)),
            Err(err) => Err(Error::FileLoading {
                virtual_path: virtual_path.clone(),
                source_path: source.clone(),
                source: err,
            }),
        }
    }

    /// [`read`](Self::read) with the default [`GameFileConstructor`].
    pub fn read_game_file(
        &self,
        virtual_path: &str,
        options: &ReadOptions,
    ) -> Result<Option<GameFile>> {
        self.read(virtual_path, options, &GameFileConstructor)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("root", &self.root)
            .field("is_extension", &self.is_extension)
            .field("extension", &self.extension)
            .field("catalogs", &self.catalogs.len())
            .field("loose_files", &self.loose_files.len())
            .finish_non_exhaustive()
    }
}

/// Lower-case a virtual path and normalize separators to `/`.
pub fn normalize_virtual_path(virtual_path: &str) -> String {
    virtual_path.replace('\\', "/").to_lowercase()
}
