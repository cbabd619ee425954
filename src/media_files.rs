use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Row};

use crate::database::Database;
use crate::downloads::LegacyDownload;
use crate::error::MediaShiftError;
use crate::filetree::FileEntry;
use crate::media_types::{self, MediaType};
use crate::pager::PageKey;

/// Version stamp of a freshly created stub, not yet classified.
pub const VERSION_STUB: i64 = 0;
/// Version stamp once storage has been classified and metadata backfilled.
pub const VERSION_CLASSIFIED: i64 = 1;
/// Version stamp of a file fully processed from an upload source.
pub const VERSION_PROCESSED_UPLOAD: i64 = 2;

#[derive(Clone, Debug)]
pub struct MediaFile {
    pub file_id: i64,
    pub folder_id: Option<i64>,
    pub name: String,
    pub extension: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub pixel_count: Option<i64>,
    pub storage_id: Option<i64>,
    pub is_new: bool,
    pub is_transient: bool,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PageKey for MediaFile {
    fn page_key(&self) -> i64 {
        self.file_id
    }
}

/// Trims leading dots and lowercases, the single normal form shared by name
/// building and destination paths.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

const SELECT_COLUMNS: &str = "file_id, folder_id, name, extension, mime_type, media_type,
     size, width, height, pixel_count, storage_id, is_new, is_transient,
     version, created_at, updated_at";

impl MediaFile {
    /// A version-0 stub for a legacy download. Classification and name
    /// finalization happen later, gated on the version stamp.
    pub fn stub_from_download(download: &LegacyDownload, folder_id: Option<i64>) -> Self {
        MediaFile {
            file_id: 0,
            folder_id,
            name: download.file_name().to_owned(),
            extension: normalize_extension(download.extension()),
            mime_type: download.mime_type().to_owned(),
            media_type: MediaType::Other,
            size: 0,
            width: None,
            height: None,
            pixel_count: None,
            storage_id: download.storage_id(),
            is_new: download.is_new(),
            is_transient: download.is_transient(),
            version: VERSION_STUB,
            created_at: download.updated_at(),
            updated_at: download.updated_at(),
        }
    }

    /// A version-2 file for an uploaded tree entry; the name keeps the
    /// extension it arrived with.
    pub fn from_upload(entry: &FileEntry, folder_id: i64) -> Self {
        MediaFile {
            file_id: 0,
            folder_id: Some(folder_id),
            name: entry.name().to_owned(),
            extension: normalize_extension(entry.extension()),
            mime_type: media_types::mime_from_name(entry.name()),
            media_type: MediaType::Other,
            size: entry.size(),
            width: None,
            height: None,
            pixel_count: None,
            storage_id: None,
            is_new: false,
            is_transient: false,
            version: VERSION_PROCESSED_UPLOAD,
            created_at: entry.last_modified(),
            updated_at: entry.last_modified(),
        }
    }

    pub fn insert(&mut self, db: &Database) -> Result<(), MediaShiftError> {
        let file_id: i64 = db.conn().query_row(
            "INSERT INTO media_files (
                 folder_id, name, extension, mime_type, media_type, size,
                 width, height, pixel_count, storage_id, is_new, is_transient,
                 version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             RETURNING file_id",
            params![
                self.folder_id,
                self.name,
                self.extension,
                self.mime_type,
                self.media_type.to_string(),
                self.size,
                self.width,
                self.height,
                self.pixel_count,
                self.storage_id,
                self.is_new,
                self.is_transient,
                self.version,
                self.created_at,
                self.updated_at,
            ],
            |row| row.get(0),
        )?;

        self.file_id = file_id;
        Ok(())
    }

    pub fn update(&self, db: &Database) -> Result<(), MediaShiftError> {
        db.conn().execute(
            "UPDATE media_files SET
                 folder_id = ?2, name = ?3, extension = ?4, mime_type = ?5,
                 media_type = ?6, size = ?7, width = ?8, height = ?9,
                 pixel_count = ?10, storage_id = ?11, version = ?12,
                 created_at = ?13, updated_at = ?14
             WHERE file_id = ?1",
            params![
                self.file_id,
                self.folder_id,
                self.name,
                self.extension,
                self.mime_type,
                self.media_type.to_string(),
                self.size,
                self.width,
                self.height,
                self.pixel_count,
                self.storage_id,
                self.version,
                self.created_at,
                self.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn set_storage(
        db: &Database,
        file_id: i64,
        storage_id: i64,
    ) -> Result<(), MediaShiftError> {
        db.conn().execute(
            "UPDATE media_files SET storage_id = ?2 WHERE file_id = ?1",
            params![file_id, storage_id],
        )?;
        Ok(())
    }

    pub fn get_by_id(db: &Database, file_id: i64) -> Result<Option<Self>, MediaShiftError> {
        db.conn()
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM media_files WHERE file_id = ?1"),
                params![file_id],
                Self::from_row,
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    /// The next page of files still at the stub version, in id order.
    pub fn load_stub_page(
        db: &Database,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<Self>, MediaShiftError> {
        let mut stmt = db.conn().prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM media_files
             WHERE version = 0 AND file_id > ?1
             ORDER BY file_id ASC
             LIMIT ?2"
        ))?;

        let files = stmt
            .query_map(params![last_id, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(files)
    }

    pub fn exists_in_folder(
        db: &Database,
        folder_id: i64,
        name: &str,
    ) -> Result<bool, MediaShiftError> {
        let count: i64 = db.conn().query_row(
            "SELECT count(*) FROM media_files WHERE folder_id = ?1 AND name = ?2",
            params![folder_id, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count(db: &Database) -> Result<i64, MediaShiftError> {
        let count: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM media_files", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let media_type: String = row.get(5)?;
        Ok(MediaFile {
            file_id: row.get(0)?,
            folder_id: row.get(1)?,
            name: row.get(2)?,
            extension: row.get(3)?,
            mime_type: row.get(4)?,
            media_type: MediaType::from_str(&media_type).unwrap_or(MediaType::Other),
            size: row.get(6)?,
            width: row.get(7)?,
            height: row.get(8)?,
            pixel_count: row.get(9)?,
            storage_id: row.get(10)?,
            is_new: row.get(11)?,
            is_transient: row.get(12)?,
            version: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}
