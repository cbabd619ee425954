use log::trace;

use crate::error::MediaShiftError;
use crate::filetree::{self, FileTree};
use crate::media_types;
use crate::report::{Skip, SkipKind};
use crate::rewrite::ReferenceMap;

/// Root of the content-addressed layout.
pub const STORAGE_ROOT: &str = "Storage";

/// Ids are zero-padded to this width in destination file names. Together
/// with [`FAN_OUT_LEN`] this scheme is load-bearing for idempotency: the
/// skip-if-exists check only works while the generated paths stay stable, so
/// neither constant may change once a store has been migrated.
pub const ID_PAD_WIDTH: usize = 7;

/// Length of the file-name prefix that selects the fan-out subdirectory.
pub const FAN_OUT_LEN: usize = 4;

/// Destination file name: padded id plus normalized extension. An empty
/// extension is derived from the MIME type; if that fails too, the name has
/// no extension.
pub fn file_name(file_id: i64, extension: &str, mime_type: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let ext = if ext.is_empty() {
        media_types::mime_to_extension(mime_type)
            .unwrap_or_default()
            .to_string()
    } else {
        ext
    };

    if ext.is_empty() {
        format!("{:0width$}", file_id, width = ID_PAD_WIDTH)
    } else {
        format!("{:0width$}.{ext}", file_id, width = ID_PAD_WIDTH)
    }
}

/// Fan-out subdirectory for a destination file name.
pub fn fan_out_dir(name: &str) -> String {
    let prefix = &name[..FAN_OUT_LEN.min(name.len())];
    filetree::join(STORAGE_ROOT, prefix)
}

/// Full destination path without touching the tree.
pub fn destination_path(file_id: i64, extension: &str, mime_type: &str) -> String {
    let name = file_name(file_id, extension, mime_type);
    let dir = fan_out_dir(&name);
    filetree::join(&dir, &name)
}

/// Copies payloads into the content-addressed layout, one batch at a time.
pub struct Relocator<'a> {
    tree: &'a dyn FileTree,
}

impl<'a> Relocator<'a> {
    pub fn new(tree: &'a dyn FileTree) -> Self {
        Relocator { tree }
    }

    /// Copies `src` to the file's destination, creating the fan-out
    /// directory if needed. An existing destination is left untouched.
    /// Returns whether a copy happened.
    pub fn copy_if_absent(
        &self,
        src: &str,
        file_id: i64,
        extension: &str,
        mime_type: &str,
    ) -> Result<bool, MediaShiftError> {
        let name = file_name(file_id, extension, mime_type);
        let dir = fan_out_dir(&name);
        let dst = filetree::join(&dir, &name);

        if self.tree.file_exists(&dst) {
            trace!("Destination '{dst}' already exists - skipping copy");
            return Ok(false);
        }

        self.tree.ensure_folder(&dir)?;
        self.tree.copy(src, &dst)?;
        Ok(true)
    }

    /// Walks the legacy downloads directory and copies every payload whose
    /// file stem matches a download id migrated in this batch. Entries with
    /// no match belong to other batches (or to nothing) and are passed over;
    /// individual copy failures are collected, never batch-aborting.
    pub fn relocate_downloads(
        &self,
        downloads_dir: &str,
        map: &ReferenceMap,
        skips: &mut Vec<Skip>,
    ) -> Result<u64, MediaShiftError> {
        if map.is_empty() || !self.tree.folder_exists(downloads_dir) {
            return Ok(0);
        }

        let mut copied = 0;
        for entry in self.tree.list_files(downloads_dir)? {
            let Some(download_id) = entry.stem().parse::<i64>().ok().filter(|id| *id > 0) else {
                continue;
            };
            let Some(file) = map.get(download_id) else {
                continue;
            };

            match self.copy_if_absent(
                entry.rel_path(),
                file.file_id,
                &file.extension,
                &file.mime_type,
            ) {
                Ok(true) => copied += 1,
                Ok(false) => {}
                Err(err) => skips.push(Skip::from_error(
                    SkipKind::CopyFailed,
                    entry.rel_path(),
                    &err,
                )),
            }
        }

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filetree::LocalFileTree;
    use crate::rewrite::NewFileRef;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::fs;

    #[test]
    fn file_names_are_padded_and_normalized() {
        assert_eq!(file_name(42, "PNG", ""), "0000042.png");
        assert_eq!(file_name(42, ".png", ""), "0000042.png");
        assert_eq!(file_name(12345678, "png", ""), "12345678.png");
        assert_eq!(file_name(7, "", "image/png"), "0000007.png");
        assert_eq!(file_name(7, "", "not/a-mime"), "0000007");
    }

    #[test]
    fn fan_out_uses_fixed_prefix() {
        assert_eq!(fan_out_dir("0000042.png"), "Storage/0000");
        assert_eq!(destination_path(42, "png", ""), "Storage/0000/0000042.png");
        assert_eq!(
            destination_path(9876543, "jpg", ""),
            "Storage/9876/9876543.jpg"
        );
    }

    #[test]
    fn copy_if_absent_skips_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let tree = LocalFileTree::new(dir.path());
        fs::write(dir.path().join("src.bin"), b"payload").unwrap();

        let relocator = Relocator::new(&tree);
        assert!(relocator.copy_if_absent("src.bin", 1, "bin", "").unwrap());

        // Corrupting the source must not affect the existing destination
        fs::write(dir.path().join("src.bin"), b"changed").unwrap();
        assert!(!relocator.copy_if_absent("src.bin", 1, "bin", "").unwrap());

        let dst = dir.path().join("Storage/0000/0000001.bin");
        assert_eq!(fs::read(dst).unwrap(), b"payload");
    }

    #[test]
    fn relocate_downloads_matches_stems_and_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let tree = LocalFileTree::new(dir.path());
        fs::create_dir(dir.path().join("Downloads")).unwrap();
        fs::write(dir.path().join("Downloads/10.png"), b"ten").unwrap();
        fs::write(dir.path().join("Downloads/notes.txt"), b"junk").unwrap();
        fs::write(dir.path().join("Downloads/99.png"), b"other batch").unwrap();

        let mut map = ReferenceMap::new();
        map.insert(
            10,
            NewFileRef {
                file_id: 500,
                extension: "png".to_string(),
                mime_type: "image/png".to_string(),
            },
        );

        let relocator = Relocator::new(&tree);
        let mut skips = Vec::new();
        let copied = relocator
            .relocate_downloads("Downloads", &map, &mut skips)
            .unwrap();

        assert_eq!(copied, 1);
        assert!(skips.is_empty());
        assert_eq!(
            fs::read(dir.path().join("Storage/0000/0000500.png")).unwrap(),
            b"ten"
        );
        // The unmatched entries stayed where they were
        assert!(dir.path().join("Downloads/99.png").exists());
    }

    #[test]
    fn missing_downloads_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let tree = LocalFileTree::new(dir.path());
        let mut map = ReferenceMap::new();
        map.insert(
            1,
            NewFileRef {
                file_id: 1,
                extension: "png".to_string(),
                mime_type: String::new(),
            },
        );

        let relocator = Relocator::new(&tree);
        let mut skips = Vec::new();
        assert_eq!(
            relocator
                .relocate_downloads("Downloads", &map, &mut skips)
                .unwrap(),
            0
        );
    }

    proptest! {
        #[test]
        fn destination_paths_are_stable_and_fanned_out(
            id in 1i64..100_000_000,
            ext in "[a-z0-9]{0,5}",
        ) {
            let first = destination_path(id, &ext, "application/octet-stream");
            let second = destination_path(id, &ext, "application/octet-stream");
            prop_assert_eq!(&first, &second);

            let name = file_name(id, &ext, "application/octet-stream");
            prop_assert!(name.len() >= ID_PAD_WIDTH);
            prop_assert_eq!(fan_out_dir(&name).len(), STORAGE_ROOT.len() + 1 + FAN_OUT_LEN);
            prop_assert!(first.starts_with(STORAGE_ROOT));
        }

        #[test]
        fn distinct_ids_never_collide(
            a in 1i64..10_000_000,
            b in 1i64..10_000_000,
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(
                destination_path(a, "bin", ""),
                destination_path(b, "bin", "")
            );
        }
    }
}
