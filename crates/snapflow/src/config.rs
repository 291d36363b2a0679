//! Layered configuration.
//!
//! Lowest to highest precedence:
//!
//! 1. [`Config::default`]
//! 2. `snapflow.toml` in the working directory, or the file given with `--config`
//! 3. `SNAPFLOW_*` environment variables (`SNAPFLOW_CONCURRENCY=8`)
//! 4. command-line flags ([`Overrides`])

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use snapflow_archive::{ExtractOptions, TarCompress};
use snapflow_fetch::RangedOptions;
use snapflow_verify::{VerifyError, parse_sha256_hex};

use crate::pipeline::PipelineOptions;
use crate::source::Source;

pub const DEFAULT_CONFIG_FILE: &str = "snapflow.toml";
pub const ENV_PREFIX: &str = "SNAPFLOW_";

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("no source given: set a url or a listing")]
    MissingUrl,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is too large")]
    TooLarge { field: &'static str },

    #[error("max_write_kib ({max_write} bytes) exceeds the {capacity}-byte buffer")]
    MaxWriteTooLarge { max_write: usize, capacity: usize },

    #[error("invalid sha256: {0}")]
    InvalidSha256(#[source] VerifyError),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self { Self::Figment(Box::new(e)) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object to download.
    pub url:                 Option<String>,
    /// Listing to pick the newest snapshot from when `url` is unset.
    pub listing:             Option<String>,
    /// Directory the archive is unpacked into.
    pub destination:         PathBuf,
    /// Window between download and extraction.
    pub buffer_size_mib:     usize,
    pub part_size_mib:       u64,
    pub concurrency:         usize,
    pub max_retries:         u32,
    pub retry_backoff_ms:    u64,
    /// Largest single write into the window.
    pub max_write_kib:       usize,
    pub compression:         TarCompress,
    pub strip_components:    usize,
    /// Expected SHA-256 of the downloaded object, hex encoded.
    pub sha256:              Option<String>,
    pub stats_interval_secs: u64,
    /// Extra request headers.
    pub headers:             BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url:                 None,
            listing:             None,
            destination:         PathBuf::from("./"),
            buffer_size_mib:     1024,
            part_size_mib:       64,
            concurrency:         4,
            max_retries:         3,
            retry_backoff_ms:    100,
            max_write_kib:       1024,
            compression:         TarCompress::Zstd,
            strip_components:    0,
            sha256:              None,
            stats_interval_secs: 5,
            headers:             BTreeMap::new(),
        }
    }
}

/// Values given on the command line. Unset flags leave lower layers alone.
#[derive(Debug, Default, Clone, Serialize, clap::Args)]
pub struct Overrides {
    /// URL of the compressed tar snapshot.
    #[arg(value_name = "URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Listing of snapshots, one key or URL per line; the newest is restored.
    #[arg(long, value_name = "URL", conflicts_with = "url")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<String>,

    /// Directory to extract into.
    #[arg(long = "dest", value_name = "DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    /// Buffer between download and extraction, in MiB.
    #[arg(long, value_name = "MIB")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size_mib: Option<usize>,

    /// Size of each ranged request, in MiB.
    #[arg(long, value_name = "MIB")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_size_mib: Option<u64>,

    /// Parts downloaded at once.
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Retries per part.
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Archive compression: zstd, gzip, xz or none.
    #[arg(long, value_name = "CODEC")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<TarCompress>,

    /// Leading path components to strip from every entry.
    #[arg(long, value_name = "N")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_components: Option<usize>,

    /// Expected SHA-256 of the downloaded object.
    #[arg(long, value_name = "HEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl Config {
    /// Defaults, file and environment layers. Command-line values go on top
    /// with [`Figment::merge`].
    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load every layer, with `overrides` highest.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(path).merge(Serialized::defaults(overrides)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source()?;

        for (field, value) in [
            ("buffer_size_mib", self.buffer_size_mib as u64),
            ("part_size_mib", self.part_size_mib),
            ("concurrency", self.concurrency as u64),
            ("max_write_kib", self.max_write_kib as u64),
            ("stats_interval_secs", self.stats_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        let capacity = self.capacity()?;
        let max_write = self.max_write()?;
        if max_write > capacity {
            return Err(ConfigError::MaxWriteTooLarge { max_write, capacity });
        }
        self.part_size()?;
        self.expected_sha256()?;
        Ok(())
    }

    /// A fixed `url` takes precedence over `listing`.
    pub fn source(&self) -> Result<Source, ConfigError> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        match (non_empty(&self.url), non_empty(&self.listing)) {
            (Some(url), _) => Ok(Source::Url(url)),
            (None, Some(listing)) => Ok(Source::Latest { listing }),
            (None, None) => Err(ConfigError::MissingUrl),
        }
    }

    pub fn capacity(&self) -> Result<usize, ConfigError> {
        self.buffer_size_mib
            .checked_mul(MIB)
            .ok_or(ConfigError::TooLarge { field: "buffer_size_mib" })
    }

    fn max_write(&self) -> Result<usize, ConfigError> {
        self.max_write_kib
            .checked_mul(KIB)
            .ok_or(ConfigError::TooLarge { field: "max_write_kib" })
    }

    fn part_size(&self) -> Result<u64, ConfigError> {
        self.part_size_mib
            .checked_mul(MIB as u64)
            .ok_or(ConfigError::TooLarge { field: "part_size_mib" })
    }

    fn expected_sha256(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        self.sha256
            .as_deref()
            .map(parse_sha256_hex)
            .transpose()
            .map_err(ConfigError::InvalidSha256)
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions, ConfigError> {
        let fetch = RangedOptions::default()
            .part_size(self.part_size()?)
            .concurrency(self.concurrency)
            .max_retries(self.max_retries)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .max_write(self.max_write()?)
            .headers(self.headers.clone().into_iter().collect());

        let mut options = PipelineOptions::default()
            .capacity(self.capacity()?)
            .fetch(fetch)
            .compression(self.compression)
            .extract(
                ExtractOptions::default()
                    .strip_components(self.strip_components)
                    .record_entries(false),
            )
            .stats_interval(Duration::from_secs(self.stats_interval_secs));
        if let Some(digest) = self.expected_sha256()? {
            options = options.sha256(digest);
        }
        Ok(options)
    }
}
