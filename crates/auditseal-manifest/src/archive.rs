//! Read access to zip archives held in memory.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ManifestError;

/// A regular file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }
}

/// An opened zip archive.
pub struct ArchiveReader<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> ArchiveReader<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self, ManifestError> {
        Ok(Self {
            zip: ZipArchive::new(Cursor::new(bytes))?,
        })
    }

    /// Every non-directory entry, sorted by path.
    pub fn files(&mut self) -> Result<Vec<ArchiveEntry>, ManifestError> {
        let mut files = BTreeMap::new();
        for index in 0..self.zip.len() {
            let mut file = self.zip.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let path = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)
                .map_err(|e| ManifestError::Entry {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            if files.insert(path.clone(), content).is_some() {
                return Err(ManifestError::DuplicatePath(path));
            }
        }
        Ok(files
            .into_iter()
            .map(|(path, content)| ArchiveEntry { path, content })
            .collect())
    }

    /// Content of `path`, `None` when the archive has no such file.
    pub fn read(&mut self, path: &str) -> Result<Option<Vec<u8>>, ManifestError> {
        let mut file = match self.zip.by_name(path) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| ManifestError::Entry {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(content))
    }

    /// Whether a file named `path` exists.
    pub fn contains(&mut self, path: &str) -> bool {
        self.zip.by_name(path).is_ok()
    }
}
