use std::sync::Arc;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Configuration for a ranged download.
///
/// # Examples
///
/// ```
/// use snapflow_fetch::RangedOptions;
/// use std::time::Duration;
///
/// let options = RangedOptions::default()
///     .part_size(16 * 1024 * 1024)
///     .concurrency(8)
///     .retry_backoff(Duration::from_millis(250))
///     .header("Authorization", "Bearer token");
/// ```
#[derive(Debug, Clone)]
pub struct RangedOptions {
    /// Bytes requested per ranged GET.
    ///
    /// Default: 64 MiB
    pub part_size: u64,

    /// Parts in flight at once. Values below 1 are treated as 1.
    ///
    /// Default: 4
    pub concurrency: usize,

    /// Retries per part after the initial attempt.
    ///
    /// - Only network failures and short bodies are retried
    /// - A retry resumes from the last byte the part delivered
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries of one part.
    ///
    /// Default: 100ms
    pub retry_backoff: Duration,

    /// Largest single write handed to the sink; bigger network chunks are split.
    ///
    /// Must not exceed the sink's capacity. Values below 1 are treated as 1.
    ///
    /// Default: 1 MiB
    pub max_write: usize,

    /// Extra headers sent with every request.
    pub headers: Arc<[(String, String)]>,
}

impl Default for RangedOptions {
    fn default() -> Self {
        Self {
            part_size:     64 * MIB,
            concurrency:   4,
            max_retries:   3,
            retry_backoff: Duration::from_millis(100),
            max_write:     MIB as usize,
            headers:       Arc::new([]),
        }
    }
}

impl RangedOptions {
    #[must_use]
    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    #[must_use]
    pub fn max_write(mut self, max_write: usize) -> Self {
        self.max_write = max_write;
        self
    }

    /// Add a single header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    /// Replace all headers.
    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Arc::from(headers);
        self
    }
}
