//! Loose file discovery.
//!
//! Loose files are unpacked files sitting under a location's recognized
//! folders. They are indexed once, keyed by lower-cased virtual path, so that a
//! read never touches the filesystem unless it actually hits.

use crate::classify::{self, EXTENSIONS_PREFIX, VIRTUAL_PATH_PREFIXES};
use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use walkdir::WalkDir;

/// Signature sidecars shipped next to signed files. Never content.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Suffix of the root-level files picked up for the base installation.
pub const ROOT_FILE_SUFFIX: &str = ".exe";

/// Index every loose file at `root`.
///
/// Each recognized folder is walked recursively. Root-level `.exe` files are
/// included for the base installation only, and the base installation skips
/// `extensions/` since extensions are separate locations. `.sig` files are
/// always skipped.
///
/// Top-level folder names are matched case-insensitively; keys are the path
/// relative to `root`, lower-cased with forward slashes, and values keep the
/// on-disk casing.
pub fn find_loose_files(
    root: &Utf8Path,
    is_extension: bool,
) -> Result<HashMap<String, Utf8PathBuf>> {
    let mut files = HashMap::new();

    if !root.as_std_path().is_dir() {
        tracing::warn!("Location {} is not a directory; no loose files", root);
        return Ok(files);
    }

    for entry in std::fs::read_dir(root.as_std_path())? {
        let entry = entry?;
        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(p) => p,
            Err(p) => {
                tracing::warn!("Skipping non-UTF-8 path: {}", p.display());
                continue;
            }
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        let name_lower = name.to_lowercase();

        if path.as_std_path().is_file() {
            if !is_extension && name_lower.ends_with(ROOT_FILE_SUFFIX) {
                insert_file(&mut files, root, path, is_extension);
            }
            continue;
        }

        let prefix = format!("{}/", name_lower);
        if !VIRTUAL_PATH_PREFIXES.contains(&prefix.as_str()) {
            continue;
        }
        if !is_extension && prefix == EXTENSIONS_PREFIX {
            continue;
        }

        walk_folder(&mut files, root, &path, is_extension)?;
    }

    Ok(files)
}

fn walk_folder(
    files: &mut HashMap<String, Utf8PathBuf>,
    root: &Utf8Path,
    folder: &Utf8Path,
    is_extension: bool,
) -> Result<()> {
    for entry in WalkDir::new(folder.as_std_path()).min_depth(1) {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }

        let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(p) => p,
            Err(p) => {
                tracing::warn!("Skipping non-UTF-8 path: {}", p.display());
                continue;
            }
        };

        insert_file(files, root, path, is_extension);
    }

    Ok(())
}

fn insert_file(
    files: &mut HashMap<String, Utf8PathBuf>,
    root: &Utf8Path,
    path: Utf8PathBuf,
    is_extension: bool,
) {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(&SIGNATURE_SUFFIX[1..]))
    {
        return;
    }

    let Ok(relative) = path.strip_prefix(root) else {
        return;
    };
    let virtual_path = relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase();

    if !classify::is_recognized_for(&virtual_path, is_extension) {
        tracing::trace!("Ignoring unrecognized loose file {}", path);
        return;
    }

    files.insert(virtual_path, path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn write(root: &Utf8Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn create_location(root: &Utf8Path) {
        write(root, "t/0001-L044.xml", "text");
        write(root, "libraries/jobs.xml", "jobs");
        write(root, "libraries/jobs.xml.sig", "signature");
        write(root, "md/Sub/Setup.XML", "setup");
        write(root, "docs/readme.txt", "not game content");
        write(root, "extensions/mod_a/content.xml", "ext content");
        write(root, "X4.exe", "binary");
        write(root, "readme.txt", "root text");
        write(root, "01.cat", "");
    }

    #[test]
    fn test_base_location_files() {
        let (_guard, root) = utf8_tempdir();
        create_location(&root);

        let files = find_loose_files(&root, false).unwrap();
        let mut keys: Vec<&str> = files.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "libraries/jobs.xml",
                "md/sub/setup.xml",
                "t/0001-l044.xml",
                "x4.exe",
            ]
        );

        // Values keep the on-disk casing.
        assert_eq!(files["t/0001-l044.xml"], root.join("t").join("0001-L044.xml"));
    }

    #[test]
    fn test_extension_location_files() {
        let (_guard, root) = utf8_tempdir();
        create_location(&root);

        let files = find_loose_files(&root, true).unwrap();
        assert!(files.contains_key("extensions/mod_a/content.xml"));
        assert!(!files.contains_key("x4.exe"));
        assert!(!files.contains_key("readme.txt"));
    }

    #[test]
    fn test_signature_files_skipped_at_any_depth() {
        let (_guard, root) = utf8_tempdir();
        write(&root, "aiscripts/deep/nested/order.xml.sig", "sig");
        write(&root, "aiscripts/deep/nested/order.xml", "order");

        let files = find_loose_files(&root, true).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("aiscripts/deep/nested/order.xml"));
    }

    #[test]
    fn test_signature_suffix_case_insensitive() {
        let (_guard, root) = utf8_tempdir();
        write(&root, "md/setup.xml", "setup");
        write(&root, "md/setup.xml.SIG", "sig");

        let files = find_loose_files(&root, true).unwrap();
        assert_eq!(files.len(), 1);
        assert!(!files.contains_key("md/setup.xml.sig"));
    }

    #[test]
    fn test_top_level_folder_case_insensitive() {
        let (_guard, root) = utf8_tempdir();
        write(&root, "Libraries/Wares.xml", "wares");

        let files = find_loose_files(&root, true).unwrap();
        assert!(files.contains_key("libraries/wares.xml"));
    }

    #[test]
    fn test_missing_root() {
        let (_guard, root) = utf8_tempdir();
        let files = find_loose_files(&root.join("nope"), false).unwrap();
        assert!(files.is_empty());
    }
}
