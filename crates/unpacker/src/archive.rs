//! Package input and archive reading.
//!
//! A [`Package`] is the raw, unvalidated upload. [`ArchiveReader`] is only
//! obtainable from a package whose zip central directory parses.

use crate::error::ExtractError;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use zip::ZipArchive;

/// An uploaded package: a named byte stream.
#[derive(Debug)]
pub struct Package<R> {
    name: String,
    reader: R,
}

impl<R: Read + Seek> Package<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Package<File> {
    /// Opens a package file. The package is named after the file.
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, file))
    }
}

impl Package<Cursor<Vec<u8>>> {
    /// Wraps an in-memory upload.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, Cursor::new(bytes.into()))
    }
}

/// Read access to a validated zip archive.
///
/// The zip reader needs exclusive access to its stream, so reads are
/// serialized internally and the reader can be shared by reference across
/// worker threads.
#[derive(Debug)]
pub struct ArchiveReader<R> {
    name: String,
    entries: Vec<String>,
    zip: Mutex<ZipArchive<R>>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Checks that `package` is a structurally valid zip container.
    ///
    /// The package's stream is rewound afterwards.
    pub fn validate(package: &mut Package<R>) -> bool {
        let valid = ZipArchive::new(&mut package.reader).is_ok();
        if let Err(e) = package.reader.seek(SeekFrom::Start(0)) {
            tracing::warn!("could not rewind {}: {}", package.name, e);
            return false;
        }
        valid
    }

    /// Validates `package` and indexes its entries.
    ///
    /// Fails with [`ExtractError::InvalidArchive`] without touching anything
    /// else when the container does not parse.
    pub fn open(package: Package<R>) -> Result<Self, ExtractError> {
        let Package { name, reader } = package;
        let invalid = |reason: String| ExtractError::InvalidArchive {
            name: name.clone(),
            reason,
        };

        let mut zip = ZipArchive::new(reader).map_err(|e| invalid(e.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index).map_err(|e| invalid(e.to_string()))?;
            entries.push(entry.name().to_string());
        }

        Ok(Self {
            name,
            entries,
            zip: Mutex::new(zip),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry paths in the container's index order, directory entries
    /// included.
    pub fn list_entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `path` names a directory record.
    pub fn is_dir_entry(&self, path: &str) -> bool {
        path.ends_with('/') || path.ends_with('\\')
    }

    /// Decompresses and returns the full payload of the entry at `path`.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>, ExtractError> {
        let mut zip = self.zip.lock();
        let entry_error = |source| ExtractError::Entry {
            path: path.to_string(),
            source,
        };

        let mut entry = zip.by_name(path).map_err(entry_error)?;
        // The declared size comes from the archive and is not trusted as a
        // capacity hint; the buffer grows with what actually decompresses.
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| entry_error(e.into()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// A stored entry `a.txt` holding "hi" whose central directory record
    /// claims, through a ZIP64 extra field, an uncompressed size near 2^63.
    fn overstated_size_zip() -> Vec<u8> {
        const CRC: u32 = 0xD893_2AAC;
        let mut out = Vec::new();

        // Local file header + data
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]); // flags, method, time, date
        out.extend_from_slice(&CRC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&5u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(b"a.txt");
        out.extend_from_slice(b"hi");

        // Central directory header
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]); // flags, method, time, date
        out.extend_from_slice(&CRC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&u32::MAX.to_le_bytes());
        out.extend_from_slice(&5u16.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&[0; 10]); // comment len, disk, attributes
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(b"a.txt");
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&0x7FFF_FFFF_FFFF_FF00u64.to_le_bytes());
        let cd_size = out.len() as u32 - cd_offset;

        // End of central directory
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn test_validate() {
        let mut good = Package::from_bytes("good.h5p", zip_bytes(&[("a.txt", b"a")]));
        assert!(ArchiveReader::validate(&mut good));
        // Still usable after validation
        assert!(ArchiveReader::open(good).is_ok());

        let mut bad = Package::from_bytes("bad.h5p", b"definitely not a zip".to_vec());
        assert!(!ArchiveReader::validate(&mut bad));

        let mut empty = Package::from_bytes("empty.h5p", Vec::new());
        assert!(!ArchiveReader::validate(&mut empty));
    }

    #[test]
    fn test_open_invalid_names_package() {
        let bad = Package::from_bytes("upload.h5p", b"PK but not really".to_vec());
        match ArchiveReader::open(bad) {
            Err(ExtractError::InvalidArchive { name, .. }) => assert_eq!(name, "upload.h5p"),
            other => panic!("expected InvalidArchive, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_list_and_read_entries() {
        let bytes = zip_bytes(&[
            ("h5p.json", b"{\"title\":\"t\"}"),
            ("content/content.json", b"{}"),
            ("z-last.txt", b"z"),
        ]);
        let reader = ArchiveReader::open(Package::from_bytes("pkg.h5p", bytes)).unwrap();

        assert_eq!(reader.name(), "pkg.h5p");
        assert_eq!(
            reader.list_entries(),
            &["h5p.json", "content/content.json", "z-last.txt"]
        );
        assert_eq!(reader.read_entry("h5p.json").unwrap(), b"{\"title\":\"t\"}");
        assert_eq!(reader.read_entry("content/content.json").unwrap(), b"{}");
        assert!(matches!(
            reader.read_entry("missing.txt"),
            Err(ExtractError::Entry { .. })
        ));
    }

    #[test]
    fn test_directory_entries_listed() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.add_directory("content/", SimpleFileOptions::default())
            .unwrap();
        zip.start_file("content/a.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"a").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let reader = ArchiveReader::open(Package::from_bytes("dirs.zip", bytes)).unwrap();
        assert_eq!(reader.list_entries(), &["content/", "content/a.txt"]);
        assert!(reader.is_dir_entry("content/"));
        assert!(!reader.is_dir_entry("content/a.txt"));
    }

    #[test]
    fn test_read_entry_ignores_declared_size() {
        let bytes = overstated_size_zip();
        assert_eq!(bytes.len(), 122);

        let mut package = Package::from_bytes("huge.h5p", bytes);
        assert!(ArchiveReader::validate(&mut package));
        let reader = ArchiveReader::open(package).unwrap();
        assert_eq!(reader.list_entries(), &["a.txt"]);

        // Either the payload or an entry error, never an allocation abort
        match reader.read_entry("a.txt") {
            Ok(data) => assert_eq!(data, b"hi"),
            Err(ExtractError::Entry { path, .. }) => assert_eq!(path, "a.txt"),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
}
