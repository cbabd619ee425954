use rusqlite::{params, OptionalExtension, Row};

use crate::database::Database;
use crate::error::MediaShiftError;

/// Number of attachment slots on a template.
pub const ATTACHMENT_SLOTS: u8 = 3;

/// A dependent of the legacy model: a message template whose attachment
/// slots reference downloads by id before migration and MediaFiles after.
#[derive(Clone, Debug)]
pub struct MessageTemplate {
    template_id: i64,
    name: String,
    attachments: [Option<i64>; ATTACHMENT_SLOTS as usize],
}

/// One occupied attachment slot, flattened for per-slot rewriting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentRef {
    pub template_id: i64,
    pub slot: u8,
    pub download_id: i64,
}

impl MessageTemplate {
    pub fn template_id(&self) -> i64 {
        self.template_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attachment(&self, slot: u8) -> Option<i64> {
        self.attachments
            .get(slot.checked_sub(1)? as usize)
            .copied()
            .flatten()
    }

    pub fn create(
        db: &Database,
        name: &str,
        attachments: [Option<i64>; ATTACHMENT_SLOTS as usize],
    ) -> Result<Self, MediaShiftError> {
        let template_id: i64 = db.conn().query_row(
            "INSERT INTO message_templates
                 (name, attachment1_id, attachment2_id, attachment3_id)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING template_id",
            params![name, attachments[0], attachments[1], attachments[2]],
            |row| row.get(0),
        )?;

        Ok(MessageTemplate {
            template_id,
            name: name.to_owned(),
            attachments,
        })
    }

    pub fn get_by_id(db: &Database, template_id: i64) -> Result<Option<Self>, MediaShiftError> {
        db.conn()
            .query_row(
                "SELECT template_id, name, attachment1_id, attachment2_id, attachment3_id
                 FROM message_templates WHERE template_id = ?1",
                params![template_id],
                Self::from_row,
            )
            .optional()
            .map_err(MediaShiftError::Database)
    }

    /// Every occupied attachment slot across all templates. Each slot is an
    /// independent reference; one template can appear up to three times.
    pub fn attachment_refs(db: &Database) -> Result<Vec<AttachmentRef>, MediaShiftError> {
        let mut stmt = db.conn().prepare(
            "SELECT template_id, attachment1_id, attachment2_id, attachment3_id
             FROM message_templates
             WHERE attachment1_id IS NOT NULL
                OR attachment2_id IS NOT NULL
                OR attachment3_id IS NOT NULL",
        )?;

        let mut refs = Vec::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?;

        for row in rows {
            let (template_id, a1, a2, a3) = row?;
            for (slot, attachment) in [(1, a1), (2, a2), (3, a3)] {
                if let Some(download_id) = attachment {
                    refs.push(AttachmentRef {
                        template_id,
                        slot,
                        download_id,
                    });
                }
            }
        }

        Ok(refs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(MessageTemplate {
            template_id: row.get(0)?,
            name: row.get(1)?,
            attachments: [row.get(2)?, row.get(3)?, row.get(4)?],
        })
    }
}
