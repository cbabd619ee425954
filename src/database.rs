use rusqlite::Connection;
use std::io;
use std::path::Path;

use crate::error::MediaShiftError;
use crate::schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION};

use log::info;
use rusqlite::OptionalExtension;

const DB_FILENAME: &str = "mediashift.db";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(db_folder: &Path) -> Result<Self, MediaShiftError> {
        // Ensure the folder exists and is a directory
        if !db_folder.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "Database folder '{}' does not exist or is not a directory",
                    db_folder.display()
                ),
            )
            .into());
        }

        let db_path = db_folder.join(DB_FILENAME);

        let conn = Connection::open(&db_path).map_err(MediaShiftError::Database)?;
        info!("Database opened at: {}", db_path.display());

        let db = Database { conn };
        db.init()?;

        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, MediaShiftError> {
        let conn = Connection::open_in_memory().map_err(MediaShiftError::Database)?;

        let db = Database { conn };
        db.init()?;

        Ok(db)
    }

    fn init(&self) -> Result<(), MediaShiftError> {
        // Foreign keys are enforced per-connection. Batch scopes defer them
        // until commit.
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.ensure_schema()
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&self) -> Result<(), MediaShiftError> {
        let table_exists: bool = self
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false);

        if !table_exists {
            return self.create_schema();
        }

        // Get the stored schema version
        let stored_version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored_version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()), // Schema is up to date
            Some(other) => Err(MediaShiftError::Error(format!(
                "Schema version mismatch: found '{other}', expected '{SCHEMA_VERSION}'"
            ))),
            None => Err(MediaShiftError::Error(
                "Schema version missing".to_string(),
            )),
        }
    }

    fn create_schema(&self) -> Result<(), MediaShiftError> {
        self.conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(())
    }
}
