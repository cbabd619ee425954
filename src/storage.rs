use std::io::{Cursor, Read};
use std::str::FromStr;

use rusqlite::{params, OptionalExtension};
use strum::{Display, EnumString};

use crate::database::Database;
use crate::error::MediaShiftError;
use crate::filetree::FileTree;
use crate::media_files::MediaFile;
use crate::relocate;

/// Inline payload row, used when the active backend keeps bytes in the
/// relational store instead of on disk.
pub struct MediaStorage;

impl MediaStorage {
    pub fn insert(db: &Database, data: &[u8]) -> Result<i64, MediaShiftError> {
        let storage_id: i64 = db.conn().query_row(
            "INSERT INTO media_storage (data) VALUES (?1) RETURNING storage_id",
            params![data],
            |row| row.get(0),
        )?;
        Ok(storage_id)
    }

    pub fn load(
        db: &Database,
        storage_id: Option<i64>,
    ) -> Result<Option<Vec<u8>>, MediaShiftError> {
        let Some(storage_id) = storage_id else {
            return Ok(None);
        };

        db.conn()
            .query_row(
                "SELECT data FROM media_storage WHERE storage_id = ?1",
                params![storage_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    pub fn size(db: &Database, storage_id: Option<i64>) -> Result<Option<i64>, MediaShiftError> {
        let Some(storage_id) = storage_id else {
            return Ok(None);
        };

        db.conn()
            .query_row(
                "SELECT length(data) FROM media_storage WHERE storage_id = ?1",
                params![storage_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }
}

/// The active payload backend, resolved once from its provider key at engine
/// construction and injected wherever payloads are read.
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum StorageBackend {
    FileSystem,
    Database,
}

impl StorageBackend {
    pub fn from_key(key: &str) -> Result<Self, MediaShiftError> {
        StorageBackend::from_str(key)
            .map_err(|_| MediaShiftError::Error(format!("Unknown storage provider '{key}'")))
    }

    pub fn is_file_system(&self) -> bool {
        matches!(self, StorageBackend::FileSystem)
    }

    /// Opens the payload of a media file, or `None` if the backend holds
    /// nothing for it (not yet relocated, or no inline row).
    pub fn open_read(
        &self,
        db: &Database,
        tree: &dyn FileTree,
        file: &MediaFile,
    ) -> Result<Option<Box<dyn Read>>, MediaShiftError> {
        match self {
            StorageBackend::FileSystem => {
                let path =
                    relocate::destination_path(file.file_id, &file.extension, &file.mime_type);
                if tree.file_exists(&path) {
                    Ok(Some(tree.open_read(&path)?))
                } else {
                    Ok(None)
                }
            }
            StorageBackend::Database => {
                let data = MediaStorage::load(db, file.storage_id)?;
                Ok(data.map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read>))
            }
        }
    }

    /// Payload length in bytes, or `None` if the backend holds nothing.
    pub fn size_of(
        &self,
        db: &Database,
        tree: &dyn FileTree,
        file: &MediaFile,
    ) -> Result<Option<i64>, MediaShiftError> {
        match self {
            StorageBackend::FileSystem => {
                let path =
                    relocate::destination_path(file.file_id, &file.extension, &file.mime_type);
                if tree.file_exists(&path) {
                    Ok(Some(tree.size_of(&path)?))
                } else {
                    Ok(None)
                }
            }
            StorageBackend::Database => MediaStorage::size(db, file.storage_id),
        }
    }
}
