use std::io::Read;

use crate::database::Database;
use crate::error::MediaShiftError;
use crate::filetree::FileTree;
use crate::imaging;
use crate::media_files::MediaFile;
use crate::media_types::{MediaType, MediaTypeResolver};
use crate::report::{Skip, SkipKind};
use crate::storage::StorageBackend;

/// Where a record's payload is read from: the active storage backend, or a
/// tree path for uploads that have not been relocated yet.
pub enum PayloadSource<'a> {
    Backend,
    TreeFile(&'a str),
}

/// Per-record metadata backfill. Never fails a batch: anything that goes
/// wrong with one record's payload is recorded as a skip and the record
/// proceeds with what it has.
pub struct Transformer<'a> {
    db: &'a Database,
    tree: &'a dyn FileTree,
    backend: &'a StorageBackend,
    resolver: &'a MediaTypeResolver,
}

impl<'a> Transformer<'a> {
    pub fn new(
        db: &'a Database,
        tree: &'a dyn FileTree,
        backend: &'a StorageBackend,
        resolver: &'a MediaTypeResolver,
    ) -> Self {
        Transformer {
            db,
            tree,
            backend,
            resolver,
        }
    }

    /// Classifies the media type, backfills a missing size, and probes image
    /// dimensions. Classification is authoritative and overwrites whatever
    /// placeholder the record carried.
    pub fn process(&self, file: &mut MediaFile, source: PayloadSource, skips: &mut Vec<Skip>) {
        if file.size == 0 {
            match self.payload_size(file, &source) {
                Ok(Some(size)) => file.size = size,
                Ok(None) => skips.push(Skip::new(
                    SkipKind::UnreadablePayload,
                    &file.name,
                    "no payload found to size",
                )),
                Err(err) => skips.push(Skip::from_error(
                    SkipKind::UnreadablePayload,
                    &file.name,
                    &err,
                )),
            }
        }

        file.media_type = self.resolver.resolve(&file.extension, &file.mime_type);

        if file.media_type == MediaType::Image && file.width.is_none() && file.height.is_none() {
            match self.open_payload(file, &source) {
                Ok(Some(reader)) => match imaging::probe_dimensions(reader) {
                    Ok((width, height)) => {
                        file.width = Some(width as i64);
                        file.height = Some(height as i64);
                    }
                    Err(err) => skips.push(Skip::from_error(
                        SkipKind::UndecodableImage,
                        &file.name,
                        &err,
                    )),
                },
                Ok(None) => {}
                Err(err) => skips.push(Skip::from_error(
                    SkipKind::UnreadablePayload,
                    &file.name,
                    &err,
                )),
            }
        }

        if let (Some(width), Some(height)) = (file.width, file.height) {
            file.pixel_count = Some(width * height);
        }
    }

    fn payload_size(
        &self,
        file: &MediaFile,
        source: &PayloadSource,
    ) -> Result<Option<i64>, MediaShiftError> {
        match source {
            PayloadSource::Backend => self.backend.size_of(self.db, self.tree, file),
            PayloadSource::TreeFile(path) => Ok(Some(self.tree.size_of(path)?)),
        }
    }

    fn open_payload(
        &self,
        file: &MediaFile,
        source: &PayloadSource,
    ) -> Result<Option<Box<dyn Read>>, MediaShiftError> {
        match source {
            PayloadSource::Backend => self.backend.open_read(self.db, self.tree, file),
            PayloadSource::TreeFile(path) => Ok(Some(self.tree.open_read(path)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::filetree::LocalFileTree;
    use crate::media_types::MediaType;
    use crate::storage::MediaStorage;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        tree: LocalFileTree,
        resolver: MediaTypeResolver,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let tree = LocalFileTree::new(dir.path());
        Fixture {
            _dir: dir,
            db: Database::open_in_memory().unwrap(),
            tree,
            resolver: MediaTypeResolver::from_config(&Config::default().media_types),
        }
    }

    fn base_file(name: &str, extension: &str, mime: &str) -> MediaFile {
        MediaFile {
            file_id: 1,
            folder_id: None,
            name: name.to_string(),
            extension: extension.to_string(),
            mime_type: mime.to_string(),
            media_type: MediaType::Other,
            size: 0,
            width: None,
            height: None,
            pixel_count: None,
            storage_id: None,
            is_new: false,
            is_transient: false,
            version: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn backfills_size_and_dimensions_from_tree_source() {
        let fx = fixture();
        let path = fx._dir.path().join("photo.png");
        image::RgbaImage::new(8, 6).save(&path).unwrap();

        let backend = StorageBackend::FileSystem;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("photo.png", "png", "image/png");
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::TreeFile("photo.png"), &mut skips);

        assert!(skips.is_empty());
        assert_eq!(file.media_type, MediaType::Image);
        assert!(file.size > 0);
        assert_eq!(file.width, Some(8));
        assert_eq!(file.height, Some(6));
        assert_eq!(file.pixel_count, Some(48));
    }

    #[test]
    fn classification_overwrites_placeholder_without_payload_probe() {
        let fx = fixture();
        let path = fx._dir.path().join("doc.pdf");
        fs::write(&path, b"%PDF-1.4 ...").unwrap();

        let backend = StorageBackend::FileSystem;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("doc.pdf", "pdf", "application/pdf");
        file.media_type = MediaType::Image; // placeholder from stub creation
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::TreeFile("doc.pdf"), &mut skips);

        assert_eq!(file.media_type, MediaType::Document);
        assert_eq!(file.size, 12);
        assert_eq!(file.width, None);
        assert_eq!(file.pixel_count, None);
    }

    #[test]
    fn undecodable_image_is_skipped_not_fatal() {
        let fx = fixture();
        let path = fx._dir.path().join("broken.png");
        fs::write(&path, b"not really a png").unwrap();

        let backend = StorageBackend::FileSystem;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("broken.png", "png", "image/png");
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::TreeFile("broken.png"), &mut skips);

        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].kind, SkipKind::UndecodableImage);
        assert_eq!(file.media_type, MediaType::Image);
        assert_eq!(file.width, None);
        assert_eq!(file.height, None);
        assert_eq!(file.pixel_count, None);
        assert!(file.size > 0); // size still backfilled
    }

    #[test]
    fn database_backend_sizes_inline_payloads() {
        let fx = fixture();
        let storage_id = MediaStorage::insert(&fx.db, b"12345").unwrap();

        let backend = StorageBackend::Database;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("blob.bin", "bin", "application/octet-stream");
        file.storage_id = Some(storage_id);
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::Backend, &mut skips);

        assert!(skips.is_empty());
        assert_eq!(file.size, 5);
        assert_eq!(file.media_type, MediaType::Other);
    }

    #[test]
    fn missing_payload_is_recorded_and_size_stays_unknown() {
        let fx = fixture();

        let backend = StorageBackend::FileSystem;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("gone.txt", "txt", "text/plain");
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::Backend, &mut skips);

        assert_eq!(file.size, 0);
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].kind, SkipKind::UnreadablePayload);
    }

    #[test]
    fn preexisting_dimensions_are_kept() {
        let fx = fixture();
        let backend = StorageBackend::FileSystem;
        let transformer = Transformer::new(&fx.db, &fx.tree, &backend, &fx.resolver);

        let mut file = base_file("art.png", "png", "image/png");
        file.size = 99;
        file.width = Some(100);
        file.height = Some(50);
        let mut skips = Vec::new();
        transformer.process(&mut file, PayloadSource::Backend, &mut skips);

        assert!(skips.is_empty()); // no probe needed, no payload touched
        assert_eq!(file.width, Some(100));
        assert_eq!(file.pixel_count, Some(5000));
    }
}
