use clap::{Args, Parser, Subcommand};
use scout::enrich::{RoutingPreferences, MAX_BATCH_SIZE};
use scout::models::Coordinate;
use scout::scrapers::CrawlParams;
use scout::scrapers::types::DEFAULT_USER_AGENT;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "listing-scout", version, about = "Crawl property listings and estimate commutes")]
pub struct Cli {
    /// SQLite database file
    #[arg(long, env = "SCOUT_DATABASE", default_value = "listings.db", global = true)]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or extend every table
    Migrate,
    /// Crawl the search results into the listing table
    Crawl(CrawlArgs),
    /// Fetch travel estimates for listings that have none
    Enrich(EnrichArgs),
    /// Print stored listings with their travel estimates
    List,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    #[arg(long, env = "SCOUT_BASE_URL", default_value = "https://www.daft.ie")]
    pub base_url: String,

    /// Search results path, e.g. /dublin-city/houses-for-rent/
    #[arg(long, env = "SCOUT_SEARCH")]
    pub search: String,

    /// Query parameter carrying the result offset
    #[arg(long, default_value = "offset")]
    pub offset_param: String,

    /// Listing pages fetched at once
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl From<CrawlArgs> for CrawlParams {
    fn from(args: CrawlArgs) -> Self {
        Self {
            base_url: args.base_url,
            search_path: args.search,
            offset_param: args.offset_param,
            concurrency: args.concurrency,
            timeout_secs: args.timeout_secs,
            user_agent: args.user_agent,
        }
    }
}

#[derive(Debug, Args)]
pub struct EnrichArgs {
    #[arg(long, env = "GMAPS_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Destination as "x,y"
    #[arg(long, env = "SCOUT_DESTINATION", value_parser = parse_coordinate)]
    pub destination: Coordinate,

    #[arg(long, default_value = "transit")]
    pub mode: String,

    /// Origins per request
    #[arg(long, default_value_t = MAX_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Region bias for route lookups, as a ccTLD
    #[arg(long, env = "SCOUT_REGION", default_value = "ie")]
    pub region: String,

    #[arg(long, default_value = "en")]
    pub language: String,
}

impl EnrichArgs {
    pub fn preferences(&self) -> RoutingPreferences {
        RoutingPreferences {
            language: self.language.clone(),
            region: self.region.clone(),
            ..RoutingPreferences::default()
        }
    }
}

fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    s.parse().map_err(|e: scout::Error| e.to_string())
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{e}"))?;
    if (1..=MAX_BATCH_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(format!("batch size must be between 1 and {MAX_BATCH_SIZE}"))
    }
}
