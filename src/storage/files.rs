//! File lifecycle and the open-file table.
//!
//! Files are created empty and grow page by page. Open files occupy slots in
//! a fixed table; the slot index is the `FileId` handed to callers.

use crate::error::{Result, StorageError};
use crate::storage::DiskFile;
use crate::types::ids::FileId;
use crate::types::MAX_FNAME_LENGTH;
use log::debug;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

struct OpenFile {
    path: PathBuf,
    disk: DiskFile,
}

/// Table of open files, indexed by `FileId`
pub struct FileTable {
    slots: Vec<Option<OpenFile>>,
}

impl FileTable {
    /// Create an empty file table
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn check_name(path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::invalid_operation("file name is not valid UTF-8"))?;
        if name.is_empty() || name.len() > MAX_FNAME_LENGTH {
            return Err(StorageError::invalid_operation(format!(
                "file name {:?} exceeds {} characters",
                name, MAX_FNAME_LENGTH
            )));
        }
        Ok(())
    }

    fn slot_of(&self, path: &Path) -> Option<FileId> {
        self.slots.iter().position(|slot| {
            slot.as_ref()
                .map(|open| open.path == path)
                .unwrap_or(false)
        }).map(FileId)
    }

    /// Create a new, empty database file. Fails if the file exists.
    pub fn create(&self, path: &Path) -> Result<()> {
        Self::check_name(path)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        debug!("created file {:?}", path);
        Ok(())
    }

    /// Remove a database file from disk. Fails if the file is open.
    pub fn destroy(&self, path: &Path) -> Result<()> {
        if self.slot_of(path).is_some() {
            return Err(StorageError::invalid_operation(format!(
                "cannot destroy open file {:?}",
                path
            )));
        }
        std::fs::remove_file(path)?;
        debug!("destroyed file {:?}", path);
        Ok(())
    }

    /// Open an existing file, returning its handle
    pub fn open(&mut self, path: &Path) -> Result<FileId> {
        Self::check_name(path)?;
        if self.slot_of(path).is_some() {
            return Err(StorageError::invalid_operation(format!(
                "file {:?} is already open",
                path
            )));
        }

        let slot = match self.slots.iter().position(|s| s.is_none()) {
            Some(free) => free,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let id = FileId(slot);

        let disk = DiskFile::open(path, id)?;
        self.slots[slot] = Some(OpenFile {
            path: path.to_path_buf(),
            disk,
        });
        debug!("opened file {:?} as {}", path, id);
        Ok(id)
    }

    /// Close an open file, releasing its slot
    pub fn close(&mut self, id: FileId) -> Result<()> {
        let open = self
            .slots
            .get_mut(id.value())
            .and_then(|slot| slot.take())
            .ok_or(StorageError::FileNotOpen(id))?;
        debug!("closed file {:?} ({})", open.path, id);
        Ok(())
    }

    /// Borrow the disk handle of an open file
    pub fn disk(&mut self, id: FileId) -> Result<&mut DiskFile> {
        self.slots
            .get_mut(id.value())
            .and_then(|slot| slot.as_mut())
            .map(|open| &mut open.disk)
            .ok_or(StorageError::FileNotOpen(id))
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}
