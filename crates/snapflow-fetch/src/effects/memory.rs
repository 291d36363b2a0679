use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use futures_util::stream;

use super::http::{BoxStream, RangeClient};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("range {start}..{end} is outside the {len}-byte object")]
    OutOfBounds { start: u64, end: u64, len: u64 },

    #[error("injected connection drop")]
    Dropped,
}

/// [`RangeClient`] serving an in-memory object.
///
/// Bodies are cut into `chunk_size` pieces to mimic network reads, and a
/// number of streams can be made to drop after their first chunk to exercise
/// retry paths. The `url` argument is ignored.
#[derive(Debug)]
pub struct MemoryClient {
    data:          Bytes,
    chunk_size:    usize,
    report_length: bool,
    drops:         AtomicU32,
}

impl MemoryClient {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data:          data.into(),
            chunk_size:    16 * 1024,
            report_length: true,
            drops:         AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Make the next `count` streams fail after delivering one chunk.
    #[must_use]
    pub fn drop_streams(self, count: u32) -> Self {
        self.drops.store(count, Ordering::SeqCst);
        self
    }

    /// Pretend the source does not know the object size.
    #[must_use]
    pub fn without_length(mut self) -> Self {
        self.report_length = false;
        self
    }

    fn take_drop(&self) -> bool {
        self.drops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl RangeClient for MemoryClient {
    type Error = MemoryError;

    async fn content_length(&self, _url: &str) -> Result<Option<u64>, Self::Error> {
        Ok(self.report_length.then_some(self.data.len() as u64))
    }

    async fn stream_range(
        &self,
        _url: &str,
        range: Range<u64>,
        _headers: &[(String, String)],
    ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
        let len = self.data.len() as u64;
        if range.start > range.end || range.end > len {
            return Err(MemoryError::OutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }

        let body = self.data.slice(range.start as usize..range.end as usize);
        let mut chunks: Vec<Result<Bytes, MemoryError>> = Vec::new();
        let mut at = 0;
        while at < body.len() {
            let next = (at + self.chunk_size).min(body.len());
            chunks.push(Ok(body.slice(at..next)));
            at = next;
        }

        if self.take_drop() {
            chunks.truncate(1);
            chunks.push(Err(MemoryError::Dropped));
        }

        Ok(Box::pin(stream::iter(chunks)))
    }
}
