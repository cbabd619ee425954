use rusqlite::{params, OptionalExtension, Row};

use crate::database::Database;
use crate::error::MediaShiftError;
use crate::pager::PageKey;

/// A pre-migration download row. Read-only during migration except for the
/// link to its replacement MediaFile.
#[derive(Clone, Debug)]
pub struct LegacyDownload {
    download_id: i64,
    file_name: String,
    extension: String,
    mime_type: String,
    use_download_url: bool,
    is_new: bool,
    is_transient: bool,
    updated_at: i64,
    storage_id: Option<i64>,
    media_file_id: Option<i64>,
}

impl PageKey for LegacyDownload {
    fn page_key(&self) -> i64 {
        self.download_id
    }
}

const SELECT_COLUMNS: &str = "download_id, file_name, extension, mime_type, use_download_url,
     is_new, is_transient, updated_at, storage_id, media_file_id";

impl LegacyDownload {
    pub fn download_id(&self) -> i64 {
        self.download_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn use_download_url(&self) -> bool {
        self.use_download_url
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_transient(&self) -> bool {
        self.is_transient
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn storage_id(&self) -> Option<i64> {
        self.storage_id
    }

    pub fn media_file_id(&self) -> Option<i64> {
        self.media_file_id
    }

    /// The next page of downloads eligible for migration: no replacement
    /// yet, payload held locally, and a usable name and extension.
    pub fn load_eligible_page(
        db: &Database,
        last_id: i64,
        limit: u32,
    ) -> Result<Vec<Self>, MediaShiftError> {
        let mut stmt = db.conn().prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM downloads
             WHERE media_file_id IS NULL
               AND use_download_url = 0
               AND file_name <> ''
               AND extension <> ''
               AND download_id > ?1
             ORDER BY download_id ASC
             LIMIT ?2"
        ))?;

        let downloads = stmt
            .query_map(params![last_id, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(downloads)
    }

    pub fn get_by_id(db: &Database, download_id: i64) -> Result<Option<Self>, MediaShiftError> {
        db.conn()
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM downloads WHERE download_id = ?1"),
                params![download_id],
                Self::from_row,
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    /// Links a download to the MediaFile that replaces it.
    pub fn link_media_file(
        db: &Database,
        download_id: i64,
        file_id: i64,
    ) -> Result<(), MediaShiftError> {
        db.conn().execute(
            "UPDATE downloads SET media_file_id = ?2 WHERE download_id = ?1",
            params![download_id, file_id],
        )?;
        Ok(())
    }

    pub fn count(db: &Database) -> Result<i64, MediaShiftError> {
        let count: i64 = db
            .conn()
            .query_row("SELECT count(*) FROM downloads", [], |row| row.get(0))?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LegacyDownload {
            download_id: row.get(0)?,
            file_name: row.get(1)?,
            extension: row.get(2)?,
            mime_type: row.get(3)?,
            use_download_url: row.get(4)?,
            is_new: row.get(5)?,
            is_transient: row.get(6)?,
            updated_at: row.get(7)?,
            storage_id: row.get(8)?,
            media_file_id: row.get(9)?,
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub struct DownloadSeed<'a> {
        pub download_id: i64,
        pub file_name: &'a str,
        pub extension: &'a str,
        pub mime_type: &'a str,
        pub use_download_url: bool,
    }

    pub fn seed_download(db: &Database, seed: &DownloadSeed) {
        db.conn()
            .execute(
                "INSERT INTO downloads
                     (download_id, file_name, extension, mime_type, use_download_url,
                      is_new, is_transient, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 1700000000)",
                params![
                    seed.download_id,
                    seed.file_name,
                    seed.extension,
                    seed.mime_type,
                    seed.use_download_url,
                ],
            )
            .unwrap();
    }
}
