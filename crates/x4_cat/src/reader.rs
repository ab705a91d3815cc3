//! Catalog index parsing and entry extraction.
//!
//! An X4 catalog is a pair of files sharing a stem: a `.cat` text index and a
//! `.dat` blob. Each `.cat` line describes one entry:
//!
//! ```text
//! libraries/jobs.xml 1834 1637166472 4b0f37a08ad5f2d7d1e6a07dca6a3c1f
//! t/0001-l044.xml 912 1637166472 9d7c0b3a4e6f3aa5d2b81f0e43c1d9e2
//! ```
//!
//! Fields are `path size timestamp md5`. The path may itself contain spaces, so
//! lines are split from the right. Payloads are stored back to back in the
//! `.dat` in line order, which means the offset of an entry is the running sum
//! of the sizes before it.

use crate::error::{CatError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// One file stored inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatEntry {
    /// Virtual path, lower-cased with forward slashes.
    pub path: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Unix modification time recorded by the packer.
    pub timestamp: u64,
    /// Lower-case hex MD5 of the payload.
    pub md5: String,
    /// Byte offset of the payload inside the `.dat` file.
    pub offset: u64,
}

/// Read-only view of a single `.cat`/`.dat` pair.
///
/// Opening parses the whole index up front; payloads are only read from the
/// `.dat` when requested through [`read`](Self::read). No file handle is kept
/// open between reads.
#[derive(Debug)]
pub struct CatReader {
    cat_path: Utf8PathBuf,
    dat_path: Utf8PathBuf,
    entries: HashMap<String, CatEntry>,
}

impl CatReader {
    /// Open and parse the catalog at `cat_path`.
    ///
    /// The sibling `.dat` must exist, but is not read yet.
    pub fn open(cat_path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let cat_path = cat_path.into();
        let dat_path = cat_path.with_extension("dat");

        if !dat_path.as_std_path().is_file() {
            return Err(CatError::MissingData(dat_path));
        }

        let text = std::fs::read_to_string(cat_path.as_std_path())?;
        let entries = parse_index(&cat_path, &text)?;

        tracing::debug!("Opened catalog {} ({} entries)", cat_path, entries.len());

        Ok(Self {
            cat_path,
            dat_path,
            entries,
        })
    }

    /// Path of the `.cat` index.
    pub fn cat_path(&self) -> &Utf8Path {
        &self.cat_path
    }

    /// Path of the `.dat` payload file.
    pub fn dat_path(&self) -> &Utf8Path {
        &self.dat_path
    }

    /// All entries, keyed by normalized virtual path.
    pub fn entries(&self) -> &HashMap<String, CatEntry> {
        &self.entries
    }

    /// Look up a single entry. The path is normalized before lookup.
    pub fn get(&self, virtual_path: &str) -> Option<&CatEntry> {
        self.entries.get(&normalize_path(virtual_path))
    }

    /// Read the payload for `virtual_path`.
    ///
    /// Returns `Ok(None)` if the catalog has no such entry. When the stored MD5
    /// does not match the payload, this fails with
    /// [`ChecksumMismatch`](CatError::ChecksumMismatch) unless
    /// `allow_md5_error` is set, in which case a warning is logged and the
    /// payload is returned anyway.
    pub fn read(&self, virtual_path: &str, allow_md5_error: bool) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.get(virtual_path) else {
            return Ok(None);
        };

        let data = self.read_entry(entry)?;
        self.verify(entry, &data, allow_md5_error)?;
        Ok(Some(data))
    }

    fn read_entry(&self, entry: &CatEntry) -> Result<Vec<u8>> {
        let mut file = File::open(self.dat_path.as_std_path())?;
        let dat_len = file.metadata()?.len();

        if entry.offset.saturating_add(entry.size) > dat_len {
            return Err(CatError::DataOutOfBounds {
                dat_path: self.dat_path.clone(),
                path: entry.path.clone(),
                offset: entry.offset,
                size: entry.size,
            });
        }

        file.seek(SeekFrom::Start(entry.offset))?;
        let mut data = vec![0u8; entry.size as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn verify(&self, entry: &CatEntry, data: &[u8], allow_md5_error: bool) -> Result<()> {
        // The packer writes placeholder hashes for empty entries.
        if data.is_empty() {
            return Ok(());
        }

        let actual = format!("{:x}", md5::compute(data));
        if actual.eq_ignore_ascii_case(&entry.md5) {
            return Ok(());
        }

        if allow_md5_error {
            tracing::warn!(
                "MD5 mismatch for '{}' in {} (expected {}, got {}); using payload anyway",
                entry.path,
                self.cat_path,
                entry.md5,
                actual
            );
            return Ok(());
        }

        Err(CatError::ChecksumMismatch {
            cat_path: self.cat_path.clone(),
            path: entry.path.clone(),
            expected: entry.md5.clone(),
            actual,
        })
    }
}

/// Normalize a catalog path: forward slashes, lower case.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Parse the text of a `.cat` file into entries with computed offsets.
///
/// A path listed more than once keeps its last line, but every line still
/// advances the offset since its payload occupies space in the `.dat`.
fn parse_index(cat_path: &Utf8Path, text: &str) -> Result<HashMap<String, CatEntry>> {
    let mut entries = HashMap::new();
    let mut offset = 0u64;

    for (idx, line) in text.trim_start_matches('\u{feff}').lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let malformed = || CatError::MalformedLine {
            cat_path: cat_path.to_path_buf(),
            line: idx + 1,
            content: line.to_string(),
        };

        let mut fields = line.trim_end().rsplitn(4, ' ');
        let md5 = fields.next().ok_or_else(malformed)?;
        let timestamp = fields.next().ok_or_else(malformed)?;
        let size = fields.next().ok_or_else(malformed)?;
        let path = fields.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;

        let size: u64 = size.parse().map_err(|_| malformed())?;
        let timestamp: u64 = timestamp.parse().map_err(|_| malformed())?;

        let path = normalize_path(path);
        let next_offset = offset.checked_add(size).ok_or_else(malformed)?;
        entries.insert(
            path.clone(),
            CatEntry {
                path,
                size,
                timestamp,
                md5: md5.to_ascii_lowercase(),
                offset,
            },
        );
        offset = next_offset;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_catalog(dir: &Utf8Path, name: &str, files: &[(&str, &str)]) -> Utf8PathBuf {
        let mut index = String::new();
        let mut data = Vec::new();
        for (path, content) in files {
            let bytes = content.as_bytes();
            index.push_str(&format!(
                "{} {} 1637166472 {:x}\n",
                path,
                bytes.len(),
                md5::compute(bytes)
            ));
            data.extend_from_slice(bytes);
        }
        let cat_path = dir.join(format!("{name}.cat"));
        fs::write(&cat_path, index).unwrap();
        fs::write(dir.join(format!("{name}.dat")), data).unwrap();
        cat_path
    }

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_open_and_read_entries() {
        let (_guard, dir) = utf8_tempdir();
        let cat = write_catalog(
            &dir,
            "01",
            &[
                ("libraries/jobs.xml", "<jobs/>"),
                ("t/0001-L044.xml", "<language id=\"44\"/>"),
            ],
        );

        let reader = CatReader::open(cat).unwrap();
        assert_eq!(reader.entries().len(), 2);
        assert_eq!(
            reader.read("libraries/jobs.xml", false).unwrap().unwrap(),
            b"<jobs/>"
        );
        // Keys are lower-cased; lookups are normalized too.
        assert_eq!(
            reader.read("T\\0001-L044.XML", false).unwrap().unwrap(),
            b"<language id=\"44\"/>"
        );
        assert_eq!(reader.get("t/0001-l044.xml").unwrap().offset, 7);
    }

    #[test]
    fn test_missing_entry_is_none() {
        let (_guard, dir) = utf8_tempdir();
        let cat = write_catalog(&dir, "01", &[("md/a.xml", "a")]);

        let reader = CatReader::open(cat).unwrap();
        assert!(reader.read("md/b.xml", false).unwrap().is_none());
    }

    #[test]
    fn test_path_with_spaces() {
        let (_guard, dir) = utf8_tempdir();
        let cat = write_catalog(&dir, "01", &[("assets/my file.xmf", "mesh")]);

        let reader = CatReader::open(cat).unwrap();
        assert_eq!(
            reader.read("assets/my file.xmf", false).unwrap().unwrap(),
            b"mesh"
        );
    }

    #[test]
    fn test_empty_entry_skips_checksum() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(dir.join("01.cat"), "md/empty.xml 0 0 00000000000000000000000000000000\n")
            .unwrap();
        fs::write(dir.join("01.dat"), b"").unwrap();

        let reader = CatReader::open(dir.join("01.cat")).unwrap();
        assert_eq!(reader.read("md/empty.xml", false).unwrap().unwrap(), b"");
    }

    #[test]
    fn test_checksum_mismatch() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(
            dir.join("01.cat"),
            "md/a.xml 3 0 ffffffffffffffffffffffffffffffff\n",
        )
        .unwrap();
        fs::write(dir.join("01.dat"), b"abc").unwrap();

        let reader = CatReader::open(dir.join("01.cat")).unwrap();
        assert!(matches!(
            reader.read("md/a.xml", false),
            Err(CatError::ChecksumMismatch { .. })
        ));
        assert_eq!(reader.read("md/a.xml", true).unwrap().unwrap(), b"abc");
    }

    #[test]
    fn test_duplicate_path_keeps_last_line() {
        let (_guard, dir) = utf8_tempdir();
        let cat = write_catalog(&dir, "01", &[("md/a.xml", "old"), ("md/a.xml", "newer")]);

        let reader = CatReader::open(cat).unwrap();
        assert_eq!(reader.entries().len(), 1);
        assert_eq!(reader.read("md/a.xml", false).unwrap().unwrap(), b"newer");
    }

    #[test]
    fn test_missing_dat() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(dir.join("01.cat"), "md/a.xml 1 0 0cc175b9c0f1b6a831c399e269772661\n").unwrap();

        assert!(matches!(
            CatReader::open(dir.join("01.cat")),
            Err(CatError::MissingData(_))
        ));
    }

    #[test]
    fn test_malformed_line() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(dir.join("01.cat"), "md/a.xml 1 0 0cc175b9c0f1b6a831c399e269772661\nbogus\n")
            .unwrap();
        fs::write(dir.join("01.dat"), b"a").unwrap();

        match CatReader::open(dir.join("01.cat")) {
            Err(CatError::MalformedLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line error, got {other:?}"),
        }
    }

    #[test]
    fn test_offset_overflow_is_malformed() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(
            dir.join("01.cat"),
            "md/a.xml 18446744073709551615 0 0cc175b9c0f1b6a831c399e269772661\n\
             md/b.xml 1 0 0cc175b9c0f1b6a831c399e269772661\n",
        )
        .unwrap();
        fs::write(dir.join("01.dat"), b"a").unwrap();

        match CatReader::open(dir.join("01.cat")) {
            Err(CatError::MalformedLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_dat() {
        let (_guard, dir) = utf8_tempdir();
        fs::write(dir.join("01.cat"), "md/a.xml 10 0 0cc175b9c0f1b6a831c399e269772661\n").unwrap();
        fs::write(dir.join("01.dat"), b"a").unwrap();

        let reader = CatReader::open(dir.join("01.cat")).unwrap();
        assert!(matches!(
            reader.read("md/a.xml", false),
            Err(CatError::DataOutOfBounds { .. })
        ));
    }
}
