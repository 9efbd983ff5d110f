//! Listing scout: crawl property listings into SQLite and enrich them with
//! travel-time estimates.

pub mod enrich;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod store;

pub use error::{Error, Result};
