use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::window::ByteWindow;

/// Writer-facing side of a window: random-offset writes plus end-of-stream.
///
/// Ranged downloaders are generic over this trait so the write path can be
/// decorated (see [`ThroughputStats`](crate::ThroughputStats)) without the
/// downloader knowing.
pub trait OffsetWrite: Send + Sync {
    /// Write all of `data` at absolute stream `offset`. Never partial.
    fn write_at(&self, data: &[u8], offset: u64) -> impl Future<Output = Result<usize>> + Send;

    /// Signal that no more writes will follow.
    fn close(&self);
}

impl OffsetWrite for ByteWindow {
    async fn write_at(&self, data: &[u8], offset: u64) -> Result<usize> {
        ByteWindow::write_at(self, data, offset).await
    }

    fn close(&self) { ByteWindow::close(self) }
}

impl<W: OffsetWrite> OffsetWrite for Arc<W> {
    fn write_at(&self, data: &[u8], offset: u64) -> impl Future<Output = Result<usize>> + Send {
        W::write_at(self, data, offset)
    }

    fn close(&self) { W::close(self) }
}
