use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn, Level};
use logging_timer::timer;
use strum::Display;

use crate::albums::{Album, ALBUM_DOWNLOADS, ALBUM_FILES, ALBUM_MESSAGES};
use crate::batch::BatchScope;
use crate::config::Config;
use crate::database::Database;
use crate::downloads::LegacyDownload;
use crate::error::MediaShiftError;
use crate::filetree::FileTree;
use crate::folders::FolderService;
use crate::media_files::{MediaFile, VERSION_CLASSIFIED};
use crate::media_types::{self, MediaTypeResolver};
use crate::pager::Pager;
use crate::relocate::Relocator;
use crate::report::{MigrationReport, Skip, SkipKind};
use crate::rewrite::{rewrite_attachments, NewFileRef, ReferenceMap};
use crate::settings::Settings;
use crate::storage::{MediaStorage, StorageBackend};
use crate::templates::MessageTemplate;
use crate::tracker::Tracker;
use crate::transform::{PayloadSource, Transformer};

/// Process-wide marker that a migration run has finished (successfully or
/// not). Callers read it to skip re-invocation.
static EXECUTED: AtomicBool = AtomicBool::new(false);

pub fn migration_executed() -> bool {
    EXECUTED.load(Ordering::Acquire)
}

#[cfg(test)]
pub(crate) fn reset_executed() {
    EXECUTED.store(false, Ordering::Release);
}

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigratorState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Shared state for the recursive uploaded-tree walk, in place of a large
/// parameter list.
struct UploadContext<'a> {
    db: &'a Database,
    tree: &'a dyn FileTree,
    backend: &'a StorageBackend,
    resolver: &'a MediaTypeResolver,
    folders: &'a mut FolderService,
    report: &'a mut MigrationReport,
}

/// Sequences the migration stages. Each stage pages to completion before the
/// next starts; every stage is safe to re-run because records carry a
/// version stamp (or an existence check) that gates reprocessing.
pub struct Migrator {
    db: Database,
    tree: Box<dyn FileTree>,
    backend: StorageBackend,
    resolver: MediaTypeResolver,
    folders: FolderService,
    config: Config,
    state: MigratorState,
}

impl Migrator {
    pub fn new(
        db: Database,
        tree: Box<dyn FileTree>,
        config: Config,
    ) -> Result<Self, MediaShiftError> {
        // The provider key is resolved exactly once; every stage receives
        // the concrete backend from here on
        let backend = StorageBackend::from_key(&config.migration.storage_provider)?;
        let resolver = MediaTypeResolver::from_config(&config.media_types);

        Ok(Migrator {
            db,
            tree,
            backend,
            resolver,
            folders: FolderService::new(),
            config,
            state: MigratorState::Idle,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Releases the store once the migrator is done with it.
    pub fn into_db(self) -> Database {
        self.db
    }

    pub fn state(&self) -> MigratorState {
        self.state
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Runs the whole pipeline. A migrator runs at most once: `Completed`
    /// and `Failed` are terminal, and the process-wide executed flag is set
    /// however the run ends. Failures surface with the original error after
    /// that teardown.
    pub fn migrate(&mut self) -> Result<MigrationReport, MediaShiftError> {
        if self.state != MigratorState::Idle {
            return Err(MediaShiftError::Error(format!(
                "Migration cannot be re-entered from state '{}'",
                self.state
            )));
        }

        self.state = MigratorState::Running;
        info!("Media migration starting ({} backend)", self.backend);

        let result = self.run_stages();

        EXECUTED.store(true, Ordering::Release);

        match result {
            Ok(report) => {
                self.state = MigratorState::Completed;
                info!(
                    "Media migration completed: {} mutation(s), {} skip(s)",
                    report.mutations(),
                    report.skips.len()
                );
                Ok(report)
            }
            Err(err) => {
                self.state = MigratorState::Failed;
                error!("Media migration failed: {err}");
                Err(err)
            }
        }
    }

    fn run_stages(&mut self) -> Result<MigrationReport, MediaShiftError> {
        let mut report = MigrationReport::default();

        self.create_albums()?;
        self.create_settings()?;
        self.migrate_downloads(&mut report)?;
        self.migrate_media_files(&mut report)?;
        self.migrate_uploaded_files(&mut report)?;
        self.detect_tracks(&mut report)?;

        self.folders.clear_cache();

        Ok(report)
    }

    /// Stage 1: register the system albums and their root folders.
    fn create_albums(&mut self) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "CreateAlbums");
        Album::ensure_defaults(&self.db, &mut self.folders)
    }

    /// Stage 2: seed missing configuration defaults.
    fn create_settings(&self) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "CreateSettings");
        let added = Settings::bootstrap_media_defaults(&self.db, &self.config.media_types)?;
        debug!("Seeded {added} setting default(s)");
        Ok(())
    }

    /// Stage 3: turn eligible legacy downloads into MediaFile stubs, move
    /// their payloads into the content-addressed layout, and repoint
    /// template attachments at the new ids.
    fn migrate_downloads(&self, report: &mut MigrationReport) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "MigrateDownloads");
        let db = &self.db;

        let Some(downloads_folder) = Album::folder_id_by_name(db, ALBUM_DOWNLOADS)? else {
            warn!("Downloads album is not registered - skipping download migration");
            return Ok(());
        };
        let messages_folder =
            Album::folder_id_by_name(db, ALBUM_MESSAGES)?.unwrap_or(downloads_folder);

        let attachment_refs = MessageTemplate::attachment_refs(db)?;
        let attachment_ids: HashSet<i64> =
            attachment_refs.iter().map(|r| r.download_id).collect();

        // Only worth carrying a reference map if someone consumes it
        let has_post_processor = self.backend.is_file_system() || !attachment_refs.is_empty();

        let mut pager = Pager::new(self.config.migration.page_size, |last_id, limit| {
            LegacyDownload::load_eligible_page(db, last_id, limit)
        });

        let mut scope = BatchScope::new(db.conn());
        while let Some(page) = pager.next_page()? {
            let mut map = ReferenceMap::new();

            scope.run(|| {
                for download in &page {
                    if download.file_name() == "undefined" {
                        // Junk rows left behind by old import bugs
                        report.skip(Skip::new(
                            SkipKind::OddLegacyName,
                            format!("download {}", download.download_id()),
                            "file name is 'undefined'",
                        ));
                        continue;
                    }

                    let folder_id = if attachment_ids.contains(&download.download_id()) {
                        messages_folder
                    } else {
                        downloads_folder
                    };

                    let mut file = MediaFile::stub_from_download(download, Some(folder_id));
                    file.insert(db)?;
                    LegacyDownload::link_media_file(db, download.download_id(), file.file_id)?;
                    report.downloads_migrated += 1;

                    if has_post_processor {
                        map.insert(
                            download.download_id(),
                            NewFileRef {
                                file_id: file.file_id,
                                extension: file.extension.clone(),
                                mime_type: file.mime_type.clone(),
                            },
                        );
                    }
                }
                Ok(())
            })?;

            // The map is only valid once these ids are persisted
            report.changes_committed += scope.commit()?;

            if self.backend.is_file_system() {
                let relocator = Relocator::new(self.tree.as_ref());
                report.payloads_copied += relocator.relocate_downloads(
                    &self.config.migration.downloads_dir,
                    &map,
                    &mut report.skips,
                )?;
            }

            if !attachment_refs.is_empty() {
                let outcome = rewrite_attachments(db, &attachment_refs, &map)?;
                report.attachments_rewritten += outcome.slots_rewritten;
                report.downloads_retired += outcome.downloads_retired;
            }

            // page and map drop here, keeping the working set at one batch
        }

        Ok(())
    }

    /// Stage 4: classify every MediaFile still at the stub version and
    /// backfill its metadata from the active backend.
    fn migrate_media_files(&self, report: &mut MigrationReport) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "MigrateMediaFiles");
        let db = &self.db;

        let transformer = Transformer::new(db, self.tree.as_ref(), &self.backend, &self.resolver);

        let mut pager = Pager::new(self.config.migration.page_size, |last_id, limit| {
            MediaFile::load_stub_page(db, last_id, limit)
        });

        let mut scope = BatchScope::new(db.conn());
        while let Some(page) = pager.next_page()? {
            scope.run(|| {
                for mut file in page {
                    if file.extension.is_empty() {
                        if let Some(ext) = media_types::mime_to_extension(&file.mime_type) {
                            file.extension = ext.to_string();
                        }
                    }

                    // The display name gains its extension exactly once,
                    // here at the stub-to-classified transition
                    if !file.extension.is_empty() {
                        file.name = format!("{}.{}", file.name, file.extension);
                    }
                    file.created_at = file.updated_at;
                    file.version = VERSION_CLASSIFIED;

                    transformer.process(&mut file, PayloadSource::Backend, &mut report.skips);

                    file.update(db)?;
                    report.files_classified += 1;
                }
                Ok(())
            })?;

            report.changes_committed += scope.commit()?;
        }

        Ok(())
    }

    /// Stage 5: walk the legacy uploaded tree, creating folders and fully
    /// processed files level by level.
    fn migrate_uploaded_files(
        &mut self,
        report: &mut MigrationReport,
    ) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "MigrateUploadedFiles");

        let Some(files_folder) = Album::folder_id_by_name(&self.db, ALBUM_FILES)? else {
            warn!("Files album is not registered - skipping uploaded file migration");
            return Ok(());
        };

        let uploaded_dir = self.config.migration.uploaded_dir.clone();
        if !self.tree.folder_exists(&uploaded_dir) {
            debug!("No uploaded tree at '{uploaded_dir}' - nothing to migrate");
            return Ok(());
        }

        let mut ctx = UploadContext {
            db: &self.db,
            tree: self.tree.as_ref(),
            backend: &self.backend,
            resolver: &self.resolver,
            folders: &mut self.folders,
            report,
        };

        Self::process_upload_folder(&mut ctx, &uploaded_dir, files_folder)
    }

    fn process_upload_folder(
        ctx: &mut UploadContext,
        folder_path: &str,
        media_folder_id: i64,
    ) -> Result<(), MediaShiftError> {
        let db = ctx.db;
        let tree = ctx.tree;
        let inline = !ctx.backend.is_file_system();

        let transformer = Transformer::new(db, tree, ctx.backend, ctx.resolver);
        let entries = tree.list_files(folder_path)?;

        // file id, source path, extension, mime type - for the post-commit copy
        let mut pending_copies: Vec<(i64, String, String, String)> = Vec::new();

        let mut scope = BatchScope::new(db.conn());
        scope.run(|| {
            for entry in &entries {
                if MediaFile::exists_in_folder(db, media_folder_id, entry.name())? {
                    // Already migrated on an earlier run
                    continue;
                }

                let mut file = MediaFile::from_upload(entry, media_folder_id);
                transformer.process(
                    &mut file,
                    PayloadSource::TreeFile(entry.rel_path()),
                    &mut ctx.report.skips,
                );
                file.insert(db)?;
                ctx.report.uploads_migrated += 1;

                if inline {
                    match tree.read_all(entry.rel_path()) {
                        Ok(data) => {
                            let storage_id = MediaStorage::insert(db, &data)?;
                            MediaFile::set_storage(db, file.file_id, storage_id)?;
                            ctx.report.payloads_inlined += 1;
                        }
                        Err(err) => ctx.report.skip(Skip::from_error(
                            SkipKind::UnreadablePayload,
                            entry.rel_path(),
                            &err,
                        )),
                    }
                } else {
                    pending_copies.push((
                        file.file_id,
                        entry.rel_path().to_string(),
                        file.extension.clone(),
                        file.mime_type.clone(),
                    ));
                }
            }
            Ok(())
        })?;

        ctx.report.changes_committed += scope.commit()?;

        let relocator = Relocator::new(tree);
        for (file_id, src, extension, mime_type) in &pending_copies {
            match relocator.copy_if_absent(src, *file_id, extension, mime_type) {
                Ok(true) => ctx.report.payloads_copied += 1,
                Ok(false) => {}
                Err(err) => ctx
                    .report
                    .skip(Skip::from_error(SkipKind::CopyFailed, src, &err)),
            }
        }
        drop(pending_copies);

        for subfolder in tree.list_folders(folder_path)? {
            // The child folder row is persisted immediately; descending
            // needs its assigned id as the parent reference
            let (folder, created) =
                ctx.folders
                    .find_or_create(db, subfolder.name(), Some(media_folder_id))?;
            if created {
                ctx.report.folders_created += 1;
            }

            Self::process_upload_folder(ctx, subfolder.rel_path(), folder.folder_id())?;
        }

        Ok(())
    }

    /// Stage 6: rebuild the album-membership index across every album.
    fn detect_tracks(&self, report: &mut MigrationReport) -> Result<(), MediaShiftError> {
        let _tmr = timer!(Level::Debug; "DetectTracks");

        for album_name in Album::album_names(&self.db)? {
            report.tracks_indexed += Tracker::reindex(&self.db, &album_name, true)?;
        }

        Ok(())
    }
}
