use log::debug;
use rusqlite::params;

use crate::database::Database;
use crate::error::MediaShiftError;

/// Rebuilds the derived album-membership index. A file belongs to an album
/// when its folder sits anywhere under the album's root folder.
pub struct Tracker;

impl Tracker {
    /// Reindexes one album. A full rescan drops the album's existing tracks
    /// first; an incremental pass only adds what is missing. Returns the
    /// number of tracks written. Unknown album names index nothing.
    pub fn reindex(
        db: &Database,
        album_name: &str,
        full_rescan: bool,
    ) -> Result<u64, MediaShiftError> {
        if full_rescan {
            db.conn().execute(
                "DELETE FROM media_tracks WHERE album_name = ?1",
                params![album_name],
            )?;
        }

        let added = db.conn().execute(
            "WITH RECURSIVE album_folders(folder_id) AS (
                 SELECT folder_id FROM albums WHERE name = ?1
                 UNION ALL
                 SELECT mf.folder_id
                 FROM media_folders mf
                 JOIN album_folders af ON mf.parent_id = af.folder_id
             )
             INSERT OR IGNORE INTO media_tracks (file_id, album_name)
             SELECT m.file_id, ?1
             FROM media_files m
             JOIN album_folders af ON m.folder_id = af.folder_id",
            params![album_name],
        )?;

        debug!("Reindexed album '{album_name}': {added} track(s)");
        Ok(added as u64)
    }

    pub fn track_count(db: &Database, album_name: &str) -> Result<i64, MediaShiftError> {
        let count: i64 = db.conn().query_row(
            "SELECT count(*) FROM media_tracks WHERE album_name = ?1",
            params![album_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::albums::{Album, ALBUM_FILES};
    use crate::folders::FolderService;
    use pretty_assertions::assert_eq;

    fn seed_file(db: &Database, folder_id: i64, name: &str) {
        db.conn()
            .execute(
                "INSERT INTO media_files (folder_id, name, created_at, updated_at)
                 VALUES (?1, ?2, 0, 0)",
                params![folder_id, name],
            )
            .unwrap();
    }

    #[test]
    fn reindex_covers_nested_folders() {
        let db = Database::open_in_memory().unwrap();
        let mut folders = FolderService::new();
        Album::ensure_defaults(&db, &mut folders).unwrap();

        let root = Album::folder_id_by_name(&db, ALBUM_FILES).unwrap().unwrap();
        let child = folders.create(&db, "A", Some(root)).unwrap();
        let grandchild = folders.create(&db, "B", Some(child.folder_id())).unwrap();

        seed_file(&db, root, "top.txt");
        seed_file(&db, child.folder_id(), "mid.txt");
        seed_file(&db, grandchild.folder_id(), "deep.txt");

        assert_eq!(Tracker::reindex(&db, ALBUM_FILES, true).unwrap(), 3);
        assert_eq!(Tracker::track_count(&db, ALBUM_FILES).unwrap(), 3);

        // A full rescan converges to the same set
        assert_eq!(Tracker::reindex(&db, ALBUM_FILES, true).unwrap(), 3);
        assert_eq!(Tracker::track_count(&db, ALBUM_FILES).unwrap(), 3);

        // An incremental pass adds nothing new
        assert_eq!(Tracker::reindex(&db, ALBUM_FILES, false).unwrap(), 0);
    }

    #[test]
    fn unknown_album_indexes_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(Tracker::reindex(&db, "missing", true).unwrap(), 0);
    }

    #[test]
    fn files_outside_the_album_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        let mut folders = FolderService::new();
        Album::ensure_defaults(&db, &mut folders).unwrap();

        let files_root = Album::folder_id_by_name(&db, ALBUM_FILES).unwrap().unwrap();
        let downloads_root = Album::folder_id_by_name(&db, "downloads").unwrap().unwrap();

        seed_file(&db, files_root, "in.txt");
        seed_file(&db, downloads_root, "out.txt");

        assert_eq!(Tracker::reindex(&db, ALBUM_FILES, true).unwrap(), 1);
    }
}
