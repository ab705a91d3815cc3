//! Resolved file payloads and the typed-file construction seam.

use crate::catalog::CatalogClass;
use crate::error::BoxError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

/// Where a resolved payload was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileSource {
    /// A loose file; the path keeps its on-disk casing.
    Loose(Utf8PathBuf),
    /// An entry in the catalog at this path.
    Catalog(Utf8PathBuf),
}

impl FileSource {
    /// The real path behind this source (loose file or `.cat`).
    pub fn path(&self) -> &Utf8Path {
        match self {
            FileSource::Loose(path) | FileSource::Catalog(path) => path.as_path(),
        }
    }

    pub fn is_loose(&self) -> bool {
        matches!(self, FileSource::Loose(_))
    }

    /// Precedence class of the catalog this came from, if any.
    ///
    /// Downstream patching uses this to tell substitutes from patches.
    pub fn catalog_class(&self) -> Option<CatalogClass> {
        match self {
            FileSource::Loose(_) => None,
            FileSource::Catalog(path) => {
                Some(CatalogClass::from_file_name(path.file_name().unwrap_or("")))
            }
        }
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Raw result of a read: the payload and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub source: FileSource,
    pub binary: Vec<u8>,
}

/// Everything a [`FileConstructor`] gets to build a game file.
#[derive(Debug)]
pub struct FileRequest<'a> {
    pub binary: Vec<u8>,
    /// Lower-cased virtual path, relative to the location.
    pub virtual_path: &'a str,
    pub source: &'a FileSource,
    /// `true` when read from the game or extension sources rather than
    /// generated at runtime.
    pub from_source: bool,
    /// Folder name of the extension the location belongs to, if any.
    pub extension_name: Option<&'a str>,
}

/// Turns resolved payloads into domain objects.
///
/// Errors returned here are wrapped in
/// [`Error::FileLoading`](crate::Error::FileLoading) by the location, so the
/// original error stays reachable through `source()`.
pub trait FileConstructor {
    type Output;

    fn construct(&self, request: FileRequest<'_>) -> Result<Self::Output, BoxError>;
}

/// Minimal game file produced by [`GameFileConstructor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFile {
    pub virtual_path: String,
    pub source: FileSource,
    pub from_source: bool,
    pub extension_name: Option<String>,
    pub kind: GameFileKind,
}

/// Decoded contents of a [`GameFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameFileKind {
    /// XML text with any byte order mark removed.
    Xml(String),
    /// Plain text (`.txt`, `.lua`).
    Text(String),
    /// Anything else, kept as bytes.
    Binary(Vec<u8>),
}

/// Why [`GameFileConstructor`] rejected a payload.
#[derive(Error, Debug)]
pub enum GameFileError {
    #[error("'{virtual_path}' is not valid UTF-8: {source}")]
    NotUtf8 {
        virtual_path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("'{virtual_path}' does not start with an XML element or declaration")]
    NotXml { virtual_path: String },
}

const XML_SUFFIXES: &[&str] = &["xml", "xsd", "xpl"];
const TEXT_SUFFIXES: &[&str] = &["txt", "lua"];

/// Default [`FileConstructor`], classifying payloads by extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct GameFileConstructor;

impl FileConstructor for GameFileConstructor {
    type Output = GameFile;

    fn construct(&self, request: FileRequest<'_>) -> Result<GameFile, BoxError> {
        let suffix = Utf8Path::new(request.virtual_path)
            .extension()
            .unwrap_or("")
            .to_ascii_lowercase();

        let kind = if XML_SUFFIXES.contains(&suffix.as_str()) {
            let text = decode_text(request.virtual_path, request.binary)?;
            if !text.trim_start().starts_with('<') {
                return Err(GameFileError::NotXml {
                    virtual_path: request.virtual_path.to_string(),
                }
                .into());
            }
            GameFileKind::Xml(text)
        } else if TEXT_SUFFIXES.contains(&suffix.as_str()) {
            GameFileKind::Text(decode_text(request.virtual_path, request.binary)?)
        } else {
            GameFileKind::Binary(request.binary)
        };

        Ok(GameFile {
            virtual_path: request.virtual_path.to_string(),
            source: request.source.clone(),
            from_source: request.from_source,
            extension_name: request.extension_name.map(str::to_string),
            kind,
        })
    }
}

fn decode_text(virtual_path: &str, binary: Vec<u8>) -> Result<String, GameFileError> {
    let text = String::from_utf8(binary).map_err(|source| GameFileError::NotUtf8 {
        virtual_path: virtual_path.to_string(),
        source,
    })?;

    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        virtual_path: &'a str,
        source: &'a FileSource,
        binary: &[u8],
    ) -> FileRequest<'a> {
        FileRequest {
            binary: binary.to_vec(),
            virtual_path,
            source,
            from_source: true,
            extension_name: Some("mod_a"),
        }
    }

    #[test]
    fn test_xml_with_bom() {
        let source = FileSource::Loose(Utf8PathBuf::from("/x4/libraries/jobs.xml"));
        let file = GameFileConstructor
            .construct(request("libraries/jobs.xml", &source, b"\xef\xbb\xbf<jobs/>"))
            .unwrap();

        assert_eq!(file.kind, GameFileKind::Xml("<jobs/>".to_string()));
        assert_eq!(file.extension_name.as_deref(), Some("mod_a"));
        assert!(file.from_source);
    }

    #[test]
    fn test_invalid_xml() {
        let source = FileSource::Catalog(Utf8PathBuf::from("/x4/01.cat"));
        let err = GameFileConstructor
            .construct(request("md/broken.xml", &source, b"not xml"))
            .unwrap_err();
        assert!(err.downcast_ref::<GameFileError>().is_some());

        let err = GameFileConstructor
            .construct(request("md/broken.xml", &source, &[0xff, 0xfe, 0x00]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GameFileError>(),
            Some(GameFileError::NotUtf8 { .. })
        ));
    }

    #[test]
    fn test_binary_passthrough() {
        let source = FileSource::Catalog(Utf8PathBuf::from("/x4/01.cat"));
        let file = GameFileConstructor
            .construct(request("assets/ship.xmf", &source, &[1, 2, 3]))
            .unwrap();
        assert_eq!(file.kind, GameFileKind::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_source_catalog_class() {
        let subst = FileSource::Catalog(Utf8PathBuf::from("/ext/subst_01.cat"));
        let patch = FileSource::Catalog(Utf8PathBuf::from("/ext/ext_01.cat"));
        let loose = FileSource::Loose(Utf8PathBuf::from("/ext/md/a.xml"));

        assert_eq!(subst.catalog_class(), Some(CatalogClass::Substitute));
        assert_eq!(patch.catalog_class(), Some(CatalogClass::Patch));
        assert_eq!(loose.catalog_class(), None);
        assert_eq!(loose.to_string(), "/ext/md/a.xml");
    }
}
