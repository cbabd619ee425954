use crate::error::MediaShiftError;

/// Implemented by records that can be paged with a monotonically increasing
/// key (the rowid-style primary key).
pub trait PageKey {
    fn page_key(&self) -> i64;
}

/// Keyset pager over an unbounded record set. The loader receives the key of
/// the last record seen and a limit, and returns the next batch in ascending
/// key order. One batch plus bookkeeping is all that is ever held; the
/// sequence is finite, lazy and non-restartable. Loader failures propagate
/// unchanged; there are no retries.
pub struct Pager<T, F>
where
    T: PageKey,
    F: FnMut(i64, u32) -> Result<Vec<T>, MediaShiftError>,
{
    load: F,
    page_size: u32,
    last_key: i64,
    exhausted: bool,
}

impl<T, F> Pager<T, F>
where
    T: PageKey,
    F: FnMut(i64, u32) -> Result<Vec<T>, MediaShiftError>,
{
    pub fn new(page_size: u32, load: F) -> Self {
        Pager {
            load,
            page_size: page_size.max(1),
            last_key: 0,
            exhausted: false,
        }
    }

    /// Returns the next batch, or `None` once the record set is drained.
    pub fn next_page(&mut self) -> Result<Option<Vec<T>>, MediaShiftError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = (self.load)(self.last_key, self.page_size)?;

        match page.last() {
            None => {
                self.exhausted = true;
                Ok(None)
            }
            Some(last) => {
                self.last_key = last.page_key();
                // A short page means the set is drained; skip the extra query
                if (page.len() as u32) < self.page_size {
                    self.exhausted = true;
                }
                Ok(Some(page))
            }
        }
    }
}
