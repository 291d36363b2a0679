//! Which object to restore.
//!
//! Either a fixed URL, or a listing: a small text object with one snapshot
//! key or URL per line. Snapshot keys carry a sortable timestamp or block
//! number, so the greatest line is the newest snapshot.

use snapflow_fetch::{FetchError, RangeClient, RangedFetcher};
use tracing::info;

/// Listings are read into memory whole.
pub const MAX_LISTING_BYTES: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read listing {listing}: {source}")]
    Fetch {
        listing: String,
        #[source]
        source:  FetchError,
    },

    #[error("listing {listing} is not valid UTF-8")]
    NotUtf8 { listing: String },

    #[error("listing {listing} has no entries")]
    Empty { listing: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    /// Newest entry of the listing at this URL.
    Latest { listing: String },
}

impl Source {
    /// The URL of the object to download.
    pub async fn resolve<C: RangeClient>(&self, fetcher: &RangedFetcher<C>) -> Result<String, SourceError> {
        let listing = match self {
            Self::Url(url) => return Ok(url.clone()),
            Self::Latest { listing } => listing,
        };

        let body = fetcher
            .fetch_small(listing, MAX_LISTING_BYTES)
            .await
            .map_err(|source| SourceError::Fetch {
                listing: listing.clone(),
                source,
            })?;
        let text = std::str::from_utf8(&body).map_err(|_| SourceError::NotUtf8 {
            listing: listing.clone(),
        })?;
        let entry = latest_entry(text).ok_or_else(|| SourceError::Empty {
            listing: listing.clone(),
        })?;

        let url = resolve_entry(listing, entry);
        info!(listing = %listing, url = %url, "picked latest snapshot");
        Ok(url)
    }
}

/// Greatest non-empty line, compared byte-wise. Lines starting with `#` are
/// comments.
pub fn latest_entry(listing: &str) -> Option<&str> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .max()
}

/// Entries with a scheme are used as they are. Others are keys relative to
/// the directory holding the listing.
pub fn resolve_entry(listing_url: &str, entry: &str) -> String {
    if entry.contains("://") {
        return entry.to_string();
    }

    let path_end = listing_url.find(['?', '#']).unwrap_or(listing_url.len());
    let without_query = &listing_url[..path_end];
    let path_start = without_query.find("://").map_or(0, |i| i + 3);
    let key = entry.trim_start_matches('/');

    match without_query[path_start..].rfind('/') {
        Some(slash) => format!("{}{key}", &without_query[..path_start + slash + 1]),
        None => format!("{without_query}/{key}"),
    }
}
