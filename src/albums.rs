use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::MediaShiftError;
use crate::folders::FolderService;

pub const ALBUM_DOWNLOADS: &str = "downloads";
pub const ALBUM_MESSAGES: &str = "messages";
pub const ALBUM_FILES: &str = "files";

/// The system albums and the display names of their root folders.
const SYSTEM_ALBUMS: [(&str, &str); 3] = [
    (ALBUM_DOWNLOADS, "Downloads"),
    (ALBUM_MESSAGES, "Messages"),
    (ALBUM_FILES, "Files"),
];

#[derive(Clone, Debug)]
pub struct Album {
    album_id: i64,
    name: String,
    folder_id: i64,
}

impl Album {
    pub fn album_id(&self) -> i64 {
        self.album_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder_id(&self) -> i64 {
        self.folder_id
    }

    /// Registers every system album, each owning a persisted root folder.
    /// Safe to call repeatedly; existing albums are left untouched.
    pub fn ensure_defaults(
        db: &Database,
        folders: &mut FolderService,
    ) -> Result<(), MediaShiftError> {
        for (album_name, folder_name) in SYSTEM_ALBUMS {
            if Album::get_by_name(db, album_name)?.is_some() {
                continue;
            }

            let folder = folders.create(db, folder_name, None)?;
            db.conn().execute(
                "INSERT INTO albums (name, folder_id) VALUES (?1, ?2)",
                params![album_name, folder.folder_id()],
            )?;
        }

        Ok(())
    }

    pub fn get_by_name(db: &Database, name: &str) -> Result<Option<Album>, MediaShiftError> {
        db.conn()
            .query_row(
                "SELECT album_id, name, folder_id FROM albums WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Album {
                        album_id: row.get(0)?,
                        name: row.get(1)?,
                        folder_id: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    pub fn folder_id_by_name(db: &Database, name: &str) -> Result<Option<i64>, MediaShiftError> {
        Ok(Album::get_by_name(db, name)?.map(|album| album.folder_id))
    }

    pub fn album_names(db: &Database) -> Result<Vec<String>, MediaShiftError> {
        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM albums ORDER BY album_id ASC")?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }
}
