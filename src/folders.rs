use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::MediaShiftError;

#[derive(Clone, Debug)]
pub struct MediaFolder {
    folder_id: i64,
    name: String,
    parent_id: Option<i64>,
}

impl MediaFolder {
    pub fn folder_id(&self) -> i64 {
        self.folder_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

/// Creates and caches media folders. Every folder is persisted (id assigned)
/// at creation time, so a child can only ever be created against a parent
/// that already exists in the store.
#[derive(Default)]
pub struct FolderService {
    cache: HashMap<i64, MediaFolder>,
}

impl FolderService {
    pub fn new() -> Self {
        FolderService::default()
    }

    pub fn create(
        &mut self,
        db: &Database,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<MediaFolder, MediaShiftError> {
        if let Some(parent_id) = parent_id {
            if self.get(db, parent_id)?.is_none() {
                return Err(MediaShiftError::Error(format!(
                    "Cannot create folder '{name}': parent folder {parent_id} does not exist"
                )));
            }
        }

        let folder_id: i64 = db.conn().query_row(
            "INSERT INTO media_folders (name, parent_id) VALUES (?1, ?2) RETURNING folder_id",
            params![name, parent_id],
            |row| row.get(0),
        )?;

        let folder = MediaFolder {
            folder_id,
            name: name.to_owned(),
            parent_id,
        };
        self.cache.insert(folder_id, folder.clone());

        Ok(folder)
    }

    pub fn get(
        &mut self,
        db: &Database,
        folder_id: i64,
    ) -> Result<Option<MediaFolder>, MediaShiftError> {
        if let Some(folder) = self.cache.get(&folder_id) {
            return Ok(Some(folder.clone()));
        }

        let folder = db
            .conn()
            .query_row(
                "SELECT folder_id, name, parent_id FROM media_folders WHERE folder_id = ?1",
                params![folder_id],
                |row| {
                    Ok(MediaFolder {
                        folder_id: row.get(0)?,
                        name: row.get(1)?,
                        parent_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(folder) = &folder {
            self.cache.insert(folder_id, folder.clone());
        }

        Ok(folder)
    }

    pub fn find(
        &self,
        db: &Database,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Option<MediaFolder>, MediaShiftError> {
        db.conn()
            .query_row(
                "SELECT folder_id, name, parent_id FROM media_folders
                 WHERE name = ?1 AND parent_id IS ?2",
                params![name, parent_id],
                |row| {
                    Ok(MediaFolder {
                        folder_id: row.get(0)?,
                        name: row.get(1)?,
                        parent_id: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    /// Returns the folder with this name and parent, creating it if absent.
    pub fn find_or_create(
        &mut self,
        db: &Database,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<(MediaFolder, bool), MediaShiftError> {
        if let Some(folder) = self.find(db, name, parent_id)? {
            self.cache.insert(folder.folder_id, folder.clone());
            return Ok((folder, false));
        }

        let folder = self.create(db, name, parent_id)?;
        Ok((folder, true))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_assigns_ids_and_caches() {
        let db = Database::open_in_memory().unwrap();
        let mut folders = FolderService::new();

        let root = folders.create(&db, "Files", None).unwrap();
        let child = folders.create(&db, "Sub", Some(root.folder_id())).unwrap();

        assert!(root.folder_id() > 0);
        assert_eq!(child.parent_id(), Some(root.folder_id()));
        assert_eq!(folders.cached_count(), 2);

        folders.clear_cache();
        assert_eq!(folders.cached_count(), 0);

        // Still resolvable from the store after the cache is gone
        let reloaded = folders.get(&db, child.folder_id()).unwrap().unwrap();
        assert_eq!(reloaded.name(), "Sub");
    }

    #[test]
    fn create_rejects_unpersisted_parent() {
        let db = Database::open_in_memory().unwrap();
        let mut folders = FolderService::new();

        let result = folders.create(&db, "Orphan", Some(9999));
        assert!(result.is_err());
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let mut folders = FolderService::new();

        let (first, created) = folders.find_or_create(&db, "A", None).unwrap();
        assert!(created);
        let (second, created) = folders.find_or_create(&db, "A", None).unwrap();
        assert!(!created);
        assert_eq!(first.folder_id(), second.folder_id());

        // Same name under a different parent is a different folder
        let (nested, created) = folders
            .find_or_create(&db, "A", Some(first.folder_id()))
            .unwrap();
        assert!(created);
        assert_ne!(nested.folder_id(), first.folder_id());
    }
}
