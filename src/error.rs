use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaShiftError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error), // Converts io::Error into MediaShiftError automatically

    #[error("Database error: {0}")]
    Database(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
