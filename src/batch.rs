use log::error;
use rusqlite::Connection;

use crate::error::MediaShiftError;

/// Scoped unit-of-work for one or more batches of mutations. A transaction
/// is opened lazily on the first write of each batch, with foreign-key
/// checks deferred to commit time. [`BatchScope::commit`] persists the batch
/// atomically and reports how many rows changed; the scope is then ready for
/// the next batch. Dropping the scope with uncommitted writes rolls back.
pub struct BatchScope<'a> {
    conn: &'a Connection,
    in_txn: bool,
    changes_at_begin: i64,
}

impl<'a> BatchScope<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        BatchScope {
            conn,
            in_txn: false,
            changes_at_begin: 0,
        }
    }

    fn total_changes(&self) -> Result<i64, MediaShiftError> {
        let count: i64 = self
            .conn
            .query_row("SELECT total_changes()", [], |row| row.get(0))?;
        Ok(count)
    }

    fn begin_if_needed(&mut self) -> Result<(), MediaShiftError> {
        if !self.in_txn {
            self.changes_at_begin = self.total_changes()?;
            self.conn
                .execute_batch("BEGIN IMMEDIATE; PRAGMA defer_foreign_keys = ON;")?;
            self.in_txn = true;
        }
        Ok(())
    }

    /// Enlists writes in the current batch, opening its transaction first if
    /// none is active yet.
    pub fn run<T, F>(&mut self, f: F) -> Result<T, MediaShiftError>
    where
        F: FnOnce() -> Result<T, MediaShiftError>,
    {
        self.begin_if_needed()?;
        f()
    }

    /// Commits the current batch and returns the number of persisted changes.
    /// A scope with no active transaction commits nothing.
    pub fn commit(&mut self) -> Result<u64, MediaShiftError> {
        if !self.in_txn {
            return Ok(0);
        }

        let changes = self.total_changes()? - self.changes_at_begin;
        self.conn.execute_batch("COMMIT")?;
        self.in_txn = false;

        Ok(changes.max(0) as u64)
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        // If we still have unflushed writes, we're in an error scenario
        // (normal path explicitly calls commit()). Rollback to maintain data integrity.
        if self.in_txn {
            error!("BatchScope dropped with uncommitted writes - rolling back transaction");
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use pretty_assertions::assert_eq;

    fn db_with_table() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL)")
            .unwrap();
        db
    }

    fn row_count(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn commit_reports_change_count() {
        let db = db_with_table();
        let mut scope = BatchScope::new(db.conn());

        scope
            .run(|| {
                db.conn().execute("INSERT INTO t (v) VALUES ('a')", [])?;
                db.conn().execute("INSERT INTO t (v) VALUES ('b')", [])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(scope.commit().unwrap(), 2);
        assert_eq!(row_count(&db), 2);
    }

    #[test]
    fn commit_without_writes_is_zero() {
        let db = db_with_table();
        let mut scope = BatchScope::new(db.conn());
        assert_eq!(scope.commit().unwrap(), 0);
    }

    #[test]
    fn scope_is_reusable_across_batches() {
        let db = db_with_table();
        let mut scope = BatchScope::new(db.conn());

        for batch in 0..3 {
            scope
                .run(|| {
                    db.conn()
                        .execute("INSERT INTO t (v) VALUES (?1)", [batch.to_string()])?;
                    Ok(())
                })
                .unwrap();
            assert_eq!(scope.commit().unwrap(), 1);
        }

        assert_eq!(row_count(&db), 3);
    }

    #[test]
    fn drop_rolls_back_uncommitted_writes() {
        let db = db_with_table();

        {
            let mut scope = BatchScope::new(db.conn());
            scope
                .run(|| {
                    db.conn().execute("INSERT INTO t (v) VALUES ('lost')", [])?;
                    Ok(())
                })
                .unwrap();
            // No commit
        }

        assert_eq!(row_count(&db), 0);
    }

    #[test]
    fn foreign_keys_are_deferred_within_a_batch() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     parent_id INTEGER NOT NULL REFERENCES parent(id)
                 );",
            )
            .unwrap();

        let mut scope = BatchScope::new(db.conn());
        scope
            .run(|| {
                // Child first; the parent arrives before commit
                db.conn()
                    .execute("INSERT INTO child (id, parent_id) VALUES (1, 10)", [])?;
                db.conn()
                    .execute("INSERT INTO parent (id) VALUES (10)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(scope.commit().unwrap(), 2);
    }
}
