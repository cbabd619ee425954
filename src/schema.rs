pub const SCHEMA_VERSION: &str = "1";

pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

CREATE TABLE IF NOT EXISTS media_folders (
    folder_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    parent_id INTEGER,  -- NULL = root-level folder owned by an album
    FOREIGN KEY (parent_id) REFERENCES media_folders(folder_id)
);

CREATE INDEX IF NOT EXISTS idx_media_folders_parent ON media_folders (parent_id, name);

CREATE TABLE IF NOT EXISTS albums (
    album_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    folder_id INTEGER NOT NULL,
    FOREIGN KEY (folder_id) REFERENCES media_folders(folder_id)
);

CREATE TABLE IF NOT EXISTS media_storage (
    storage_id INTEGER PRIMARY KEY AUTOINCREMENT,
    data BLOB
);

CREATE TABLE IF NOT EXISTS media_files (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id INTEGER,
    name TEXT NOT NULL,
    extension TEXT NOT NULL DEFAULT '',
    mime_type TEXT NOT NULL DEFAULT '',
    media_type TEXT NOT NULL DEFAULT 'other',
    size INTEGER NOT NULL DEFAULT 0,
    width INTEGER,
    height INTEGER,
    pixel_count INTEGER,
    storage_id INTEGER,
    is_new BOOLEAN NOT NULL DEFAULT 0,
    is_transient BOOLEAN NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 0,  -- 0 = stub, 1 = classified, 2 = processed upload
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (folder_id) REFERENCES media_folders(folder_id),
    FOREIGN KEY (storage_id) REFERENCES media_storage(storage_id)
);

CREATE INDEX IF NOT EXISTS idx_media_files_version ON media_files (version, file_id);
CREATE INDEX IF NOT EXISTS idx_media_files_folder ON media_files (folder_id, name);

CREATE TABLE IF NOT EXISTS downloads (
    download_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL DEFAULT '',
    extension TEXT NOT NULL DEFAULT '',
    mime_type TEXT NOT NULL DEFAULT '',
    use_download_url BOOLEAN NOT NULL DEFAULT 0,
    is_new BOOLEAN NOT NULL DEFAULT 0,
    is_transient BOOLEAN NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    storage_id INTEGER,  -- legacy inline blob, if any
    media_file_id INTEGER,  -- set once the download has been migrated
    FOREIGN KEY (media_file_id) REFERENCES media_files(file_id)
);

CREATE INDEX IF NOT EXISTS idx_downloads_unmigrated ON downloads (media_file_id, download_id);

CREATE TABLE IF NOT EXISTS message_templates (
    template_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    attachment1_id INTEGER,
    attachment2_id INTEGER,
    attachment3_id INTEGER
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS media_tracks (
    track_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL,
    album_name TEXT NOT NULL,
    FOREIGN KEY (file_id) REFERENCES media_files(file_id),
    UNIQUE (file_id, album_name)
);

COMMIT;
"#;
