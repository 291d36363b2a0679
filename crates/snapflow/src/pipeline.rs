//! Download-to-disk driver.
//!
//! One [`ByteWindow`] joins the two halves of a transfer:
//!
//! - a tokio task runs the ranged download and writes parts into the window
//!   at their absolute offsets, closing it when the download ends
//! - a blocking thread reads the window front to back, optionally hashing
//!   it, and feeds the decompressor and tar extractor
//!
//! Memory use stays bounded by the window capacity however large the object.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use snapflow_archive::{ExtractOptions, ExtractReport, TarCompress, extract_stream};
use snapflow_fetch::{FetchError, RangeClient, RangedFetcher, RangedOptions};
use snapflow_verify::{Sha256Hasher, VerifiedReader, VerifyError};
use snapflow_window::{ByteWindow, OffsetWrite, Throughput, ThroughputStats, WindowReader};
use tracing::{debug, info, warn};

const MIB: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid window: {0}")]
    Window(#[from] snapflow_window::Error),

    #[error("download failed: {0}")]
    Download(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] snapflow_archive::Error),

    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("failed to read the stream past the end of the archive: {0}")]
    Drain(#[source] io::Error),

    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Configuration for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Window capacity in bytes; bounds memory held between download and
    /// extraction.
    ///
    /// Default: 1024 MiB
    pub capacity: usize,

    pub fetch: RangedOptions,

    /// Default: zstd
    pub compression: TarCompress,

    pub extract: ExtractOptions,

    /// Expected SHA-256 of the whole downloaded object.
    pub sha256: Option<Vec<u8>>,

    /// How often the download rate is logged.
    ///
    /// Default: 5s
    pub stats_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            capacity:       1024 * MIB,
            fetch:          RangedOptions::default(),
            compression:    TarCompress::Zstd,
            extract:        ExtractOptions::default(),
            sha256:         None,
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn fetch(mut self, fetch: RangedOptions) -> Self {
        self.fetch = fetch;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: TarCompress) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn extract(mut self, extract: ExtractOptions) -> Self {
        self.extract = extract;
        self
    }

    #[must_use]
    pub fn sha256(mut self, digest: Vec<u8>) -> Self {
        self.sha256 = Some(digest);
        self
    }

    #[must_use]
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub downloaded_bytes: u64,
    pub throughput:       Throughput,
    pub extract:          ExtractReport,
}

pub struct Pipeline<C> {
    fetcher: Arc<RangedFetcher<C>>,
    options: PipelineOptions,
}

impl<C: RangeClient + 'static> Pipeline<C> {
    /// Writes larger than the window would never fit, so the fetcher's write
    /// size is capped at the window capacity.
    pub fn new(client: C, mut options: PipelineOptions) -> Self {
        options.fetch.max_write = options.fetch.max_write.min(options.capacity.max(1));
        let fetcher = RangedFetcher::new(client).with_options(options.fetch.clone());
        Self {
            fetcher: Arc::new(fetcher),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions { &self.options }

    pub fn fetcher(&self) -> &RangedFetcher<C> { &self.fetcher }

    /// Download `url` and unpack it into `destination`.
    ///
    /// If extraction fails the download is cancelled. When both sides fail,
    /// the download error is reported because it is usually what starved
    /// the extractor.
    pub async fn run(&self, url: &str, destination: &Path) -> Result<PipelineReport> {
        let window = Arc::new(ByteWindow::new(self.options.capacity)?);
        let stats = Arc::new(ThroughputStats::new(Arc::clone(&window)));
        let reporter = stats.spawn_reporter(self.options.stats_interval);

        info!(
            url,
            destination = %destination.display(),
            window_mib = self.options.capacity / MIB,
            "starting pipeline"
        );

        let writer = {
            let fetcher = Arc::clone(&self.fetcher);
            let stats = Arc::clone(&stats);
            let url = url.to_string();
            tokio::spawn(async move {
                let sink = CloseOnDrop(stats);
                let result = fetcher.download(&url, &*sink.0).await;
                drop(sink);
                match &result {
                    Ok(bytes) => info!(bytes, "download finished"),
                    Err(e) => warn!(error = %e, "download failed"),
                }
                result
            })
        };

        let reader = {
            let reader = window.reader();
            let job = ReadJob {
                compression: self.options.compression,
                destination: destination.to_path_buf(),
                extract:     self.options.extract.clone(),
                sha256:      self.options.sha256.clone(),
            };
            tokio::task::spawn_blocking(move || job.run(reader))
        };

        let read_result = match reader.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };

        let outcome = match read_result {
            Ok(extract) => match writer.await {
                Ok(Ok(downloaded)) => Ok((downloaded, extract)),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            },
            Err(read_error) => {
                window.cancel();
                writer.abort();
                match writer.await {
                    Ok(Err(e)) if !is_cancellation(&e) => Err(e.into()),
                    Err(e) if e.is_panic() => Err(e.into()),
                    _ => Err(read_error),
                }
            }
        };

        reporter.stop().await;
        stats.report();

        let (downloaded_bytes, extract) = outcome?;
        Ok(PipelineReport {
            downloaded_bytes,
            throughput: stats.snapshot(),
            extract,
        })
    }
}

/// Closes the sink when the download task ends, however it ends. A panic in
/// the download would otherwise leave the reader waiting on an open window.
struct CloseOnDrop<W: OffsetWrite>(W);

impl<W: OffsetWrite> Drop for CloseOnDrop<W> {
    fn drop(&mut self) { self.0.close(); }
}

fn is_cancellation(e: &FetchError) -> bool {
    matches!(e, FetchError::Sink(snapflow_window::Error::Cancelled))
}

/// Everything the blocking reader thread needs.
struct ReadJob {
    compression: TarCompress,
    destination: PathBuf,
    extract:     ExtractOptions,
    sha256:      Option<Vec<u8>>,
}

impl ReadJob {
    fn run(self, reader: WindowReader) -> Result<ExtractReport> {
        match &self.sha256 {
            Some(expected) => {
                let mut verified = VerifiedReader::new(reader, Sha256Hasher::new());
                let report = self.extract_and_drain(&mut verified)?;
                let hashed = verified.bytes_read();
                verified.finish(expected)?;
                info!(bytes = hashed, "checksum verified");
                Ok(report)
            }
            None => {
                let mut reader = reader;
                self.extract_and_drain(&mut reader)
            }
        }
    }

    /// The archive can end before the stream does (tar padding, trailing
    /// frames). Reading the rest keeps writers from blocking on a full window
    /// and lets the hash cover the whole object.
    fn extract_and_drain<R: Read>(&self, reader: &mut R) -> Result<ExtractReport> {
        let report = extract_stream(&mut *reader, self.compression, &self.destination, &self.extract)?;
        let trailing = io::copy(reader, &mut io::sink()).map_err(PipelineError::Drain)?;
        debug!(bytes = trailing, "drained stream after archive end");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_cli_defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.capacity, 1024 * MIB);
        assert_eq!(options.compression, TarCompress::Zstd);
        assert_eq!(options.stats_interval, Duration::from_secs(5));
        assert!(options.sha256.is_none());
    }

    #[test]
    fn max_write_is_capped_at_the_window() {
        let options = PipelineOptions::default()
            .capacity(4096)
            .fetch(RangedOptions::default().max_write(1 << 20));
        let pipeline = Pipeline::new(snapflow_fetch::MemoryClient::new(Vec::new()), options);
        assert_eq!(pipeline.options().fetch.max_write, 4096);
        assert_eq!(pipeline.fetcher.options().max_write, 4096);
    }

    #[test]
    fn window_is_closed_when_the_download_unwinds() {
        let window = Arc::new(ByteWindow::new(8).unwrap());
        let sink = Arc::clone(&window);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _sink = CloseOnDrop(sink);
            panic!("download blew up");
        }));

        assert!(outcome.is_err());
        assert!(window.is_closed());
    }

    #[test]
    fn only_window_cancellation_counts_as_cancellation() {
        assert!(is_cancellation(&FetchError::Sink(snapflow_window::Error::Cancelled)));
        assert!(!is_cancellation(&FetchError::Sink(snapflow_window::Error::Closed)));
        assert!(!is_cancellation(&FetchError::UnknownLength));
    }
}
