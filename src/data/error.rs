//! Errors raised while loading the canonical table.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce the canonical table. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin} is missing required column '{column}'")]
    MissingColumn { origin: String, column: String },

    #[error("{0} contained no usable rows")]
    Empty(String),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
