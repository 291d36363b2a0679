//! Throughput accounting around the write path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::Result;
use crate::sink::OffsetWrite;

const MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time view of the bytes that went through a [`ThroughputStats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub bytes:       u64,
    pub elapsed:     Duration,
    pub mib_per_sec: f64,
}

/// [`OffsetWrite`] decorator that tallies successfully written bytes.
///
/// Failures here never affect the wrapped writer; the counters are purely
/// observational.
#[derive(Debug)]
pub struct ThroughputStats<W> {
    inner:      W,
    started_at: Instant,
    bytes:      AtomicU64,
}

impl<W> ThroughputStats<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            started_at: Instant::now(),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &W { &self.inner }

    pub fn total_bytes(&self) -> u64 { self.bytes.load(Ordering::Relaxed) }

    pub fn snapshot(&self) -> Throughput {
        let bytes = self.total_bytes();
        let elapsed = self.started_at.elapsed();
        let secs = elapsed.as_secs_f64();
        let mib_per_sec = if secs > 0.0 {
            bytes as f64 / MIB / secs
        } else {
            0.0
        };
        Throughput {
            bytes,
            elapsed,
            mib_per_sec,
        }
    }

    /// Log the current rate at info level.
    pub fn report(&self) {
        let t = self.snapshot();
        info!(
            bytes = t.bytes,
            elapsed_secs = t.elapsed.as_secs(),
            "rate (MiB/s): {:.2}",
            t.mib_per_sec
        );
    }
}

impl<W: Send + Sync + 'static> ThroughputStats<W> {
    /// Spawn a task that calls [`report`](Self::report) every `interval`.
    ///
    /// The first report fires one full interval after spawning. A zero
    /// interval is raised to one millisecond.
    pub fn spawn_reporter(self: &Arc<Self>, interval: Duration) -> ReporterHandle {
        let interval = interval.max(Duration::from_millis(1));
        let stats = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => stats.report(),
                    _ = &mut stop_rx => return,
                }
            }
        });
        ReporterHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

impl<W: OffsetWrite> OffsetWrite for ThroughputStats<W> {
    async fn write_at(&self, data: &[u8], offset: u64) -> Result<usize> {
        let written = self.inner.write_at(data, offset).await?;
        self.bytes.fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn close(&self) { self.inner.close() }
}

/// Handle to a running throughput reporter. Dropping it stops the reporter.
#[derive(Debug)]
pub struct ReporterHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Stop the reporter and wait for its task to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
