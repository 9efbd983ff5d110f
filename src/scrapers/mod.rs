pub mod crawler;
pub mod daft;
pub mod http;
pub mod traits;
pub mod types;

pub use crawler::{CrawlReport, Crawler};
pub use daft::DaftParser;
pub use http::HttpSource;
pub use traits::{ListingParser, PageSource};
pub use types::CrawlParams;
