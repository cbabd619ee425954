use strum::Display;

use crate::error::MediaShiftError;

/// Why a single item was passed over. Collected instead of discarded so a
/// run can be audited afterwards; none of these abort a batch.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// Legacy record carried a junk file name and was not migrated.
    OddLegacyName,
    /// Payload could not be copied to its destination.
    CopyFailed,
    /// Payload could not be opened or sized.
    UnreadablePayload,
    /// Image header could not be decoded; dimensions stay unknown.
    UndecodableImage,
}

#[derive(Debug, Clone)]
pub struct Skip {
    pub kind: SkipKind,
    pub subject: String,
    pub detail: String,
}

impl Skip {
    pub fn new(kind: SkipKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Skip {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    pub fn from_error(kind: SkipKind, subject: impl Into<String>, err: &MediaShiftError) -> Self {
        Skip::new(kind, subject, err.to_string())
    }
}

/// Outcome of a completed migration run: per-stage mutation counters plus
/// every per-item skip that occurred along the way.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub downloads_migrated: u64,
    pub files_classified: u64,
    pub uploads_migrated: u64,
    pub folders_created: u64,
    pub payloads_copied: u64,
    pub payloads_inlined: u64,
    pub attachments_rewritten: u64,
    pub downloads_retired: u64,
    pub tracks_indexed: u64,
    pub changes_committed: u64,
    pub skips: Vec<Skip>,
}

impl MigrationReport {
    /// Total entity mutations performed by the version-gated stages. Zero on
    /// a re-run over an already-migrated store.
    pub fn mutations(&self) -> u64 {
        self.downloads_migrated
            + self.files_classified
            + self.uploads_migrated
            + self.folders_created
            + self.payloads_copied
            + self.payloads_inlined
            + self.attachments_rewritten
            + self.downloads_retired
    }

    pub fn skip(&mut self, skip: Skip) {
        self.skips.push(skip);
    }
}
