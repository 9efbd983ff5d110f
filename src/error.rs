use crate::models::Coordinate;
use thiserror::Error;

/// Errors produced by the crawl, store and enrichment layers
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or non-success status fetching a page
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The parser could not extract a required field
    #[error("failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// A stored value could not be decoded into its declared storage type
    #[error("malformed {storage} value {value:?} in field `{field}`: {reason}")]
    MalformedValue {
        field: String,
        storage: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot migrate table `{table}`: connection has a row decoder for `{decoder}` installed")]
    SchemaPrecondition {
        table: String,
        decoder: &'static str,
    },

    /// The distance matrix answered with a non-OK top-level status
    #[error("distance matrix request failed with status {0}")]
    BatchApi(String),

    /// One origin/destination pair of a batch came back with a non-OK status
    #[error("no route from {origin} for {listing_url}: {status}")]
    Element {
        listing_url: String,
        origin: Coordinate,
        status: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
