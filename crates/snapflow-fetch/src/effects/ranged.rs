use std::ops::Range;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use snapflow_window::OffsetWrite;
use tracing::{debug, info, warn};

use crate::core::{Segment, plan_segments, retry_delay};
use crate::data::RangedOptions;
use crate::effects::http::RangeClient;
use crate::error::{FetchError, Result};

/// Downloads an object as concurrent ranged parts straight into an
/// [`OffsetWrite`] sink.
///
/// The sink sees writes in whatever order the network delivers them; it is
/// up to the sink to reorder and to apply backpressure. The fetcher never
/// closes the sink.
pub struct RangedFetcher<C> {
    client:  C,
    options: RangedOptions,
}

impl<C: RangeClient> RangedFetcher<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: RangedOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RangedOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RangedOptions { &self.options }

    /// Object size as reported by the source.
    pub async fn content_length(&self, url: &str) -> Result<u64> {
        self.client
            .content_length(url)
            .await
            .map_err(Self::map_error)?
            .ok_or(FetchError::UnknownLength)
    }

    /// Download `url` into `sink`, returning the number of bytes written.
    ///
    /// Stops at the first part that fails for good; parts still in flight are
    /// dropped.
    pub async fn download<S: OffsetWrite>(&self, url: &str, sink: &S) -> Result<u64> {
        let total = self.content_length(url).await?;
        let segments = plan_segments(total, self.options.part_size)?;
        info!(
            url,
            total_bytes = total,
            parts = segments.len(),
            concurrency = self.options.concurrency,
            "starting ranged download"
        );

        let mut pending = segments.into_iter();
        let mut in_flight = FuturesUnordered::new();
        for segment in pending.by_ref().take(self.options.concurrency.max(1)) {
            in_flight.push(self.fetch_segment(url, segment, sink));
        }

        let mut written = 0u64;
        while let Some(result) = in_flight.next().await {
            written += result?;
            if let Some(segment) = pending.next() {
                in_flight.push(self.fetch_segment(url, segment, sink));
            }
        }

        info!(url, bytes = written, "ranged download finished");
        Ok(written)
    }

    async fn fetch_segment<S: OffsetWrite>(&self, url: &str, segment: Segment, sink: &S) -> Result<u64> {
        let mut cursor = segment.start;
        let mut attempt = 0u32;

        loop {
            match self.stream_into(url, cursor..segment.end, sink, &mut cursor).await {
                Ok(()) => {
                    debug!(part = segment.index, start = segment.start, end = segment.end, "part done");
                    return Ok(segment.len());
                }
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    let delay = retry_delay(attempt, self.options.retry_backoff);
                    warn!(
                        part = segment.index,
                        attempt = attempt + 1,
                        resume_at = cursor,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying part"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(FetchError::MaxRetriesExceeded {
                        part:     segment.index,
                        attempts: attempt + 1,
                        source:   Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Stream `range` into the sink, advancing `cursor` past every byte the
    /// sink accepted so a retry can resume there.
    async fn stream_into<S: OffsetWrite>(
        &self,
        url: &str,
        range: Range<u64>,
        sink: &S,
        cursor: &mut u64,
    ) -> Result<()> {
        let end = range.end;
        let mut body = self
            .client
            .stream_range(url, range, &self.options.headers)
            .await
            .map_err(Self::map_error)?;
        let max_write = self.options.max_write.max(1);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Self::map_error)?;
            if chunk.len() as u64 > end - *cursor {
                return Err(FetchError::BodyOverrun { expected_end: end });
            }
            for piece in chunk.chunks(max_write) {
                sink.write_at(piece, *cursor).await?;
                *cursor += piece.len() as u64;
            }
        }

        if *cursor < end {
            return Err(FetchError::ShortBody {
                expected_end: end,
                received_end: *cursor,
            });
        }
        Ok(())
    }

    /// Read a small object into memory with one request and no retries.
    ///
    /// Objects larger than `limit` are refused before the body is requested.
    pub async fn fetch_small(&self, url: &str, limit: u64) -> Result<Vec<u8>> {
        let total = self.content_length(url).await?;
        if total > limit {
            return Err(FetchError::TooLarge { len: total, limit });
        }
        let mut data = Vec::with_capacity(total as usize);
        if total == 0 {
            return Ok(data);
        }

        let mut body = self
            .client
            .stream_range(url, 0..total, &self.options.headers)
            .await
            .map_err(Self::map_error)?;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Self::map_error)?;
            if (data.len() + chunk.len()) as u64 > total {
                return Err(FetchError::BodyOverrun { expected_end: total });
            }
            data.extend_from_slice(&chunk);
        }

        if (data.len() as u64) < total {
            return Err(FetchError::ShortBody {
                expected_end: total,
                received_end: data.len() as u64,
            });
        }
        debug!(url, bytes = total, "fetched small object");
        Ok(data)
    }

    fn map_error<E: std::error::Error>(e: E) -> FetchError { FetchError::Network(e.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::memory::MemoryClient;
    use snapflow_window::{ByteWindow, ReadOutcome};
    use std::sync::Arc;
    use std::time::Duration;

    fn object(len: usize) -> Vec<u8> { (0..len).map(|i| (i % 253) as u8).collect() }

    async fn drain(window: &ByteWindow) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match window.read(&mut buf).await.unwrap() {
                ReadOutcome::Data(n) => out.extend_from_slice(&buf[..n]),
                ReadOutcome::EndOfStream => return out,
            }
        }
    }

    #[tokio::test]
    async fn parts_reassemble_in_a_roomy_window() {
        let data = object(10_000);
        let fetcher = RangedFetcher::new(MemoryClient::new(data.clone()).chunk_size(700))
            .with_options(RangedOptions::default().part_size(1_000).concurrency(4));
        let window = ByteWindow::new(16_384).unwrap();

        let written = fetcher.download("mem://object", &window).await.unwrap();
        window.close();

        assert_eq!(written, 10_000);
        assert_eq!(drain(&window).await, data);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn small_window_applies_backpressure_to_parts() {
        let data = object(50_000);
        let fetcher = Arc::new(
            RangedFetcher::new(MemoryClient::new(data.clone()).chunk_size(512))
                .with_options(RangedOptions::default().part_size(4_096).concurrency(6).max_write(256)),
        );
        let window = Arc::new(ByteWindow::new(2_048).unwrap());

        let writer = {
            let fetcher = Arc::clone(&fetcher);
            let window = Arc::clone(&window);
            tokio::spawn(async move {
                let result = fetcher.download("mem://object", &*window).await;
                window.close();
                result
            })
        };

        let out = drain(&window).await;
        assert_eq!(writer.await.unwrap().unwrap(), 50_000);
        assert_eq!(out, data);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_parts_resume_where_they_stopped() {
        let data = object(8_000);
        let fetcher = RangedFetcher::new(MemoryClient::new(data.clone()).chunk_size(300).drop_streams(3))
            .with_options(
                RangedOptions::default()
                    .part_size(2_000)
                    .concurrency(2)
                    .retry_backoff(Duration::from_millis(10)),
            );
        let window = ByteWindow::new(8_000).unwrap();

        assert_eq!(fetcher.download("mem://object", &window).await.unwrap(), 8_000);
        window.close();
        assert_eq!(drain(&window).await, data);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(1_000)).chunk_size(100).drop_streams(10))
            .with_options(
                RangedOptions::default()
                    .part_size(1_000)
                    .max_retries(2)
                    .retry_backoff(Duration::from_millis(1)),
            );
        let window = ByteWindow::new(1_000).unwrap();

        match fetcher.download("mem://object", &window).await {
            Err(FetchError::MaxRetriesExceeded { part, attempts, .. }) => {
                assert_eq!(part, 0);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected retry exhaustion, got {other:?}"),
        }
        // Each attempt delivered one chunk before dropping.
        assert_eq!(window.pending_ranges(), 3);
    }

    #[tokio::test]
    async fn oversized_writes_are_not_retried() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(1_000)).chunk_size(500))
            .with_options(RangedOptions::default().part_size(1_000).max_write(500));
        let window = ByteWindow::new(100).unwrap();

        let err = fetcher.download("mem://object", &window).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Sink(snapflow_window::Error::WriteTooLarge { len: 500, capacity: 100 })
        ));
    }

    #[tokio::test]
    async fn unknown_length_is_an_error() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(10)).without_length());
        let window = ByteWindow::new(10).unwrap();
        assert!(matches!(
            fetcher.download("mem://object", &window).await,
            Err(FetchError::UnknownLength)
        ));
    }

    #[tokio::test]
    async fn empty_object_writes_nothing() {
        let fetcher = RangedFetcher::new(MemoryClient::new(Vec::new()));
        let window = ByteWindow::new(10).unwrap();
        assert_eq!(fetcher.download("mem://object", &window).await.unwrap(), 0);
        window.close();
        assert!(drain(&window).await.is_empty());
    }

    #[tokio::test]
    async fn small_objects_are_read_whole() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(3_000)).chunk_size(700));
        assert_eq!(fetcher.fetch_small("mem://listing", 4_096).await.unwrap(), object(3_000));
    }

    #[tokio::test]
    async fn small_fetch_refuses_large_objects() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(5_000)));
        let err = fetcher.fetch_small("mem://listing", 4_096).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { len: 5_000, limit: 4_096 }), "{err}");
    }

    #[tokio::test]
    async fn small_fetch_does_not_retry() {
        let fetcher = RangedFetcher::new(MemoryClient::new(object(3_000)).chunk_size(100).drop_streams(1));
        let err = fetcher.fetch_small("mem://listing", 4_096).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "{err}");
    }
}
