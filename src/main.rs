mod cli;

use cli::{Cli, Command, EnrichArgs};
use anyhow::Context;
use chrono::{Local, TimeZone, Utc};
use clap::Parser;
use scout::enrich::{self, DistanceBatcher, GoogleDistanceMatrix};
use scout::models::{Distance, Listing};
use scout::scrapers::{CrawlParams, Crawler, DaftParser, HttpSource};
use scout::store::{self, RecordStore, Session};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Cli { database, command } = Cli::parse();
    info!("🏠 Listing Scout ({})", database.display());

    match command {
        Command::Migrate => migrate(&database),
        Command::Crawl(args) => crawl(&database, args.into()).await,
        Command::Enrich(args) => enrich(&database, args).await,
        Command::List => list(&database).await,
    }
}

fn migrate(database: &Path) -> anyhow::Result<()> {
    let mut session = Session::open(database)
        .with_context(|| format!("failed to open {}", database.display()))?;
    let reports = store::migrate(&mut session).context("migration failed")?;
    for report in reports {
        if report.added_columns.is_empty() {
            info!("{} is up to date", report.table);
        } else {
            info!("{}: added {}", report.table, report.added_columns.join(", "));
        }
    }
    Ok(())
}

fn open_store(database: &Path) -> anyhow::Result<RecordStore> {
    RecordStore::open(database)
        .with_context(|| format!("failed to open {}", database.display()))
}

async fn crawl(database: &Path, params: CrawlParams) -> anyhow::Result<()> {
    let store = open_store(database)?;
    let source = HttpSource::new(&params)?;
    let parser = DaftParser::new()?;
    let crawler = Crawler::new(source, parser, store, params);

    let report = crawler.run().await.context("crawl aborted")?;
    info!(
        "✅ {} listings from {} pages ({} failed)",
        report.persisted, report.pages, report.failed
    );
    Ok(())
}

async fn enrich(database: &Path, args: EnrichArgs) -> anyhow::Result<()> {
    let store = open_store(database)?;
    let preferences = args.preferences();
    let client = GoogleDistanceMatrix::new(args.api_key)?;
    let batcher = DistanceBatcher::new(client, store)
        .with_batch_size(args.batch_size)
        .with_preferences(preferences);

    let arrival = enrich::arrival_time(Local::now().naive_local());
    let arrival = Local
        .from_local_datetime(&arrival)
        .earliest()
        .context("arrival time does not exist in the local timezone")?
        .with_timezone(&Utc);
    info!("Estimating {} routes arriving at {}", args.mode, arrival);

    let report = batcher
        .enrich(&args.mode, args.destination, arrival)
        .await
        .context("enrichment aborted")?;
    info!(
        "✅ {} new estimates from {} requests ({} unroutable)",
        report.written, report.requests, report.skipped
    );
    Ok(())
}

async fn list(database: &Path) -> anyhow::Result<()> {
    let store = open_store(database)?;
    let listings = store.all::<Listing>().await?;
    let distances = store.distances_by_listing().await?;

    for (i, listing) in listings.iter().enumerate() {
        print_listing(i + 1, listing, distances.get(&listing.url).map(Vec::as_slice));
    }
    info!("{} listings", listings.len());
    Ok(())
}

fn print_listing(n: usize, listing: &Listing, distances: Option<&[Distance]>) {
    let price = listing
        .price
        .map(|p| format!("€{p}"))
        .unwrap_or_else(|| "price unknown".to_string());
    println!(
        "{}. {} ({})",
        n,
        listing.address.as_deref().unwrap_or("unknown address"),
        price
    );

    let beds = listing.beds.map_or("?".to_string(), |b| b.to_string());
    let baths = listing.bathrooms.map_or("?".to_string(), |b| b.to_string());
    match listing.area {
        Some(area) => println!("   {beds} beds, {baths} baths, {area:.1} m²"),
        None => println!("   {beds} beds, {baths} baths"),
    }
    if let Some(location) = listing.location {
        println!("   Location: {}", location);
    }
    if let Some(added) = listing.added {
        println!("   Added: {}", added);
    }
    if let Some(first_seen) = listing.first_seen {
        println!("   First seen: {}", first_seen.format("%Y-%m-%d %H:%M"));
    }
    for d in distances.unwrap_or_default() {
        println!(
            "   {} to {}: {}, {}",
            d.mode, d.destination, d.duration_text, d.distance_text
        );
    }
    println!("   URL: {}", listing.url);
    println!();
}
