use std::future::Future;
use std::ops::Range;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Source of byte ranges of a remote object.
///
/// # Implementations
///
/// - [`ReqwestClient`]: HTTP(S) with `Range` requests
/// - [`MemoryClient`](crate::MemoryClient): in-memory object, for tests and local replays
pub trait RangeClient: Send + Sync {
    /// Error type for client operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Size of the object, if the source reports one.
    fn content_length(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<u64>, Self::Error>> + Send;

    /// Stream the bytes in `range` (half-open) of the object.
    ///
    /// Implementations may deliver fewer bytes than requested if the
    /// connection drops; the caller detects that and retries.
    fn stream_range(
        &self,
        url: &str,
        range: Range<u64>,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use futures_util::TryStreamExt;
    use reqwest::StatusCode;
    use reqwest::header::{CONTENT_LENGTH, RANGE};

    #[derive(Debug, thiserror::Error)]
    pub enum HttpError {
        #[error(transparent)]
        Request(#[from] reqwest::Error),

        #[error("server answered {status} to a request for bytes {start}..{end}; range requests are not honored")]
        RangeIgnored { status: StatusCode, start: u64, end: u64 },
    }

    /// HTTP client issuing `Range: bytes=a-b` requests.
    ///
    /// Only `206 Partial Content` is accepted for a range. A plain `200` is
    /// tolerated when the range starts at zero and the body is exactly the
    /// requested length, which is a whole object served as-is.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Self { Self::default() }

        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }
    }

    impl RangeClient for ReqwestClient {
        type Error = HttpError;

        async fn content_length(&self, url: &str) -> Result<Option<u64>, Self::Error> {
            let response = self.client.head(url).send().await?.error_for_status()?;
            let length = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            Ok(length)
        }

        async fn stream_range(
            &self,
            url: &str,
            range: Range<u64>,
            headers: &[(String, String)],
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            let last = range.end.saturating_sub(1);
            let mut request = self
                .client
                .get(url)
                .header(RANGE, format!("bytes={}-{}", range.start, last));

            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            let response = request.send().await?.error_for_status()?;
            check_range_status(response.status(), &range, response.content_length())?;
            Ok(Box::pin(response.bytes_stream().map_err(HttpError::from)))
        }
    }

    fn check_range_status(status: StatusCode, range: &Range<u64>, body_len: Option<u64>) -> Result<(), HttpError> {
        let whole_object = status == StatusCode::OK && range.start == 0 && body_len == Some(range.end);
        if status == StatusCode::PARTIAL_CONTENT || whole_object {
            return Ok(());
        }
        Err(HttpError::RangeIgnored {
            status,
            start: range.start,
            end: range.end,
        })
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{HttpError, ReqwestClient};
