use std::collections::{HashMap, HashSet};

use log::debug;
use rusqlite::params;

use crate::batch::BatchScope;
use crate::database::Database;
use crate::error::MediaShiftError;
use crate::templates::AttachmentRef;

/// The MediaFile created for one legacy download within the current batch,
/// carrying what relocation and rewriting need to know about it.
#[derive(Clone, Debug)]
pub struct NewFileRef {
    pub file_id: i64,
    pub extension: String,
    pub mime_type: String,
}

/// Batch-scoped map from legacy download identity to its replacement.
/// Built after the batch commits (ids must be persisted) and dropped at the
/// batch boundary.
#[derive(Default)]
pub struct ReferenceMap {
    entries: HashMap<i64, NewFileRef>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        ReferenceMap::default()
    }

    pub fn insert(&mut self, download_id: i64, file: NewFileRef) {
        self.entries.insert(download_id, file);
    }

    pub fn get(&self, download_id: i64) -> Option<&NewFileRef> {
        self.entries.get(&download_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RewriteOutcome {
    pub slots_rewritten: u64,
    pub downloads_retired: u64,
}

/// Repoints template attachment slots from migrated download ids to the
/// replacement MediaFile ids, then deletes the orphaned downloads. Slots are
/// rewritten independently; slots whose download is not in the map are left
/// alone. Nothing is written when no slot matches.
pub fn rewrite_attachments(
    db: &Database,
    refs: &[AttachmentRef],
    map: &ReferenceMap,
) -> Result<RewriteOutcome, MediaShiftError> {
    let matched: Vec<(&AttachmentRef, &NewFileRef)> = refs
        .iter()
        .filter_map(|r| map.get(r.download_id).map(|file| (r, file)))
        .collect();

    if matched.is_empty() {
        return Ok(RewriteOutcome::default());
    }

    let mut outcome = RewriteOutcome::default();
    let mut retired: HashSet<i64> = HashSet::new();
    let mut scope = BatchScope::new(db.conn());

    scope.run(|| {
        for (attachment, file) in &matched {
            let column = match attachment.slot {
                1 => "attachment1_id",
                2 => "attachment2_id",
                3 => "attachment3_id",
                other => {
                    return Err(MediaShiftError::Error(format!(
                        "Invalid attachment slot: {other}"
                    )))
                }
            };

            let changed = db.conn().execute(
                &format!(
                    "UPDATE message_templates SET {column} = ?1
                     WHERE template_id = ?2 AND {column} = ?3"
                ),
                params![file.file_id, attachment.template_id, attachment.download_id],
            )?;

            if changed > 0 {
                outcome.slots_rewritten += 1;
                retired.insert(attachment.download_id);
            }
        }

        for download_id in &retired {
            let deleted = db.conn().execute(
                "DELETE FROM downloads WHERE download_id = ?1",
                params![download_id],
            )?;
            outcome.downloads_retired += deleted as u64;
        }

        Ok(())
    })?;

    scope.commit()?;
    debug!(
        "Rewrote {} attachment slot(s), retired {} download(s)",
        outcome.slots_rewritten, outcome.downloads_retired
    );

    Ok(outcome)
}
