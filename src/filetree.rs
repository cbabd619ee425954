use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::MediaShiftError;

/// A file visible through a [`FileTree`], addressed by a logical
/// '/'-separated path relative to the tree root.
#[derive(Clone, Debug)]
pub struct FileEntry {
    rel_path: String,
    name: String,
    size: i64,
    last_modified: i64,
}

impl FileEntry {
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    /// File name including extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Extension without the leading dot; empty if there is none.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "",
        }
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }
}

#[derive(Clone, Debug)]
pub struct FolderEntry {
    rel_path: String,
    name: String,
}

impl FolderEntry {
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Joins logical '/'-separated paths.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Narrow file-system contract used by the migration: logical folder/file
/// records addressed relative to a root, not raw OS paths.
pub trait FileTree {
    fn list_files(&self, folder: &str) -> Result<Vec<FileEntry>, MediaShiftError>;
    fn list_folders(&self, folder: &str) -> Result<Vec<FolderEntry>, MediaShiftError>;
    fn file_exists(&self, path: &str) -> bool;
    fn folder_exists(&self, path: &str) -> bool;
    fn ensure_folder(&self, path: &str) -> Result<(), MediaShiftError>;
    fn copy(&self, src: &str, dst: &str) -> Result<(), MediaShiftError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read>, MediaShiftError>;
    fn size_of(&self, path: &str) -> Result<i64, MediaShiftError>;

    fn read_all(&self, path: &str) -> Result<Vec<u8>, MediaShiftError> {
        let mut data = Vec::new();
        self.open_read(path)?.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// [`FileTree`] over a local directory.
pub struct LocalFileTree {
    root: PathBuf,
}

impl LocalFileTree {
    pub fn new(root: &Path) -> Self {
        LocalFileTree {
            root: root.to_path_buf(),
        }
    }

    fn resolve(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path.trim_start_matches('/'))
    }
}

fn mtime_epoch(modified: std::io::Result<SystemTime>) -> i64 {
    modified
        .map(|st| DateTime::<Utc>::from(st).timestamp())
        .unwrap_or(0)
}

impl FileTree for LocalFileTree {
    fn list_files(&self, folder: &str) -> Result<Vec<FileEntry>, MediaShiftError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(self.resolve(folder))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(FileEntry {
                rel_path: join(folder, &name),
                name,
                size: metadata.len() as i64,
                last_modified: mtime_epoch(metadata.modified()),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn list_folders(&self, folder: &str) -> Result<Vec<FolderEntry>, MediaShiftError> {
        let mut folders = Vec::new();

        for entry in fs::read_dir(self.resolve(folder))? {
            let entry = entry?;
            if !entry.metadata()?.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            folders.push(FolderEntry {
                rel_path: join(folder, &name),
                name,
            });
        }

        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn folder_exists(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn ensure_folder(&self, path: &str) -> Result<(), MediaShiftError> {
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), MediaShiftError> {
        fs::copy(self.resolve(src), self.resolve(dst))?;
        Ok(())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read>, MediaShiftError> {
        Ok(Box::new(fs::File::open(self.resolve(path))?))
    }

    fn size_of(&self, path: &str) -> Result<i64, MediaShiftError> {
        Ok(fs::metadata(self.resolve(path))?.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree_with_fixture() -> (tempfile::TempDir, LocalFileTree) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Uploaded/Sub")).unwrap();
        fs::write(dir.path().join("Uploaded/photo.png"), b"png bytes").unwrap();
        fs::write(dir.path().join("Uploaded/notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("Uploaded/Sub/deep.pdf"), b"pdf").unwrap();
        let tree = LocalFileTree::new(dir.path());
        (dir, tree)
    }

    #[test]
    fn lists_files_sorted_with_metadata() {
        let (_dir, tree) = tree_with_fixture();

        let files = tree.list_files("Uploaded").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["notes.txt", "photo.png"]);

        let photo = &files[1];
        assert_eq!(photo.rel_path(), "Uploaded/photo.png");
        assert_eq!(photo.stem(), "photo");
        assert_eq!(photo.extension(), "png");
        assert_eq!(photo.size(), 9);
        assert!(photo.last_modified() > 0);
    }

    #[test]
    fn lists_folders() {
        let (_dir, tree) = tree_with_fixture();

        let folders = tree.list_folders("Uploaded").unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name(), "Sub");
        assert_eq!(folders[0].rel_path(), "Uploaded/Sub");
    }

    #[test]
    fn copy_and_existence() {
        let (_dir, tree) = tree_with_fixture();

        assert!(tree.file_exists("Uploaded/notes.txt"));
        assert!(!tree.file_exists("Uploaded"));
        assert!(tree.folder_exists("Uploaded/Sub"));

        tree.ensure_folder("Storage/0000").unwrap();
        tree.copy("Uploaded/notes.txt", "Storage/0000/0000001.txt")
            .unwrap();
        assert!(tree.file_exists("Storage/0000/0000001.txt"));
        assert_eq!(tree.read_all("Storage/0000/0000001.txt").unwrap(), b"hello");
        assert_eq!(tree.size_of("Uploaded/notes.txt").unwrap(), 5);
    }

    #[test]
    fn extension_of_dotfile_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        let tree = LocalFileTree::new(dir.path());

        let files = tree.list_files("").unwrap();
        assert_eq!(files[0].name(), ".hidden");
        assert_eq!(files[0].stem(), ".hidden");
        assert_eq!(files[0].extension(), "");
    }
}
