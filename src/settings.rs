use rusqlite::{params, OptionalExtension};

use crate::config::MediaTypesConfig;
use crate::database::Database;
use crate::error::MediaShiftError;

pub struct Settings;

impl Settings {
    /// Adds a setting only if the key is absent. Returns whether a row was
    /// written.
    pub fn add_default(db: &Database, key: &str, value: &str) -> Result<bool, MediaShiftError> {
        let changed = db.conn().execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(changed > 0)
    }

    pub fn get(db: &Database, key: &str) -> Result<Option<String>, MediaShiftError> {
        db.conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    /// Seeds the per-media-type extension list settings. Existing keys keep
    /// their stored values.
    pub fn bootstrap_media_defaults(
        db: &Database,
        media_types: &MediaTypesConfig,
    ) -> Result<u64, MediaShiftError> {
        let defaults = [
            ("media.image_types", media_types.image.as_str()),
            ("media.video_types", media_types.video.as_str()),
            ("media.audio_types", media_types.audio.as_str()),
            ("media.document_types", media_types.document.as_str()),
            ("media.text_types", media_types.text.as_str()),
        ];

        let mut added = 0;
        for (key, value) in defaults {
            if Settings::add_default(db, key, value)? {
                added += 1;
            }
        }

        Ok(added)
    }
}
