//! Worker configuration from environment variables.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `DATABASE_URL` | yes | |
//! | `REDIS_URL` | yes | |
//! | `SEARCH_API_KEY` | yes | |
//! | `SEARCH_API_VERSION` | no | `2023-11-01` |
//! | `EMBEDDING_API_URL` | yes | |
//! | `EMBEDDING_API_KEY` | yes | |
//! | `EMBEDDING_MODEL` | no | `text-embedding-3-small` |
//! | `JOB_MAX_DEQUEUE_COUNT` | no | job table budget |
//! | `STALLED_DOCUMENT_THRESHOLD_SECS` | no | `21600` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use ragworks_indexing::DEFAULT_STALLED_THRESHOLD;

pub const DEFAULT_SEARCH_API_VERSION: &str = "2023-11-01";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub search_api_key: String,
    pub search_api_version: String,
    pub embedding_api_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    /// Overrides the per-job retry budget when set.
    pub max_dequeue_count: Option<u32>,
    pub stalled_threshold: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let max_dequeue_count = parse_optional::<u32>(&lookup, "JOB_MAX_DEQUEUE_COUNT")?;
        if max_dequeue_count == Some(0) {
            return Err(ConfigError::Invalid {
                name: "JOB_MAX_DEQUEUE_COUNT",
                value: "0".to_string(),
            });
        }

        let stalled_threshold = parse_optional::<u64>(&lookup, "STALLED_DOCUMENT_THRESHOLD_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STALLED_THRESHOLD);

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            search_api_key: required("SEARCH_API_KEY")?,
            search_api_version: lookup("SEARCH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.to_string()),
            embedding_api_url: required("EMBEDDING_API_URL")?,
            embedding_api_key: required("EMBEDDING_API_KEY")?,
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            max_dequeue_count,
            stalled_threshold,
        })
    }
}

fn parse_optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> ConfigResult<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

// Keys stay out of logs.
impl core::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("search_api_version", &self.search_api_version)
            .field("embedding_api_url", &self.embedding_api_url)
            .field("embedding_model", &self.embedding_model)
            .field("max_dequeue_count", &self.max_dequeue_count)
            .field("stalled_threshold", &self.stalled_threshold)
            .finish_non_exhaustive()
    }
}
