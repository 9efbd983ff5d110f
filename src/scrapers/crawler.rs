use crate::error::Result;
use crate::models::Listing;
use crate::scrapers::traits::{ListingParser, PageSource};
use crate::scrapers::types::CrawlParams;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Counts from one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Discovery pages that returned at least one link
    pub pages: usize,
    /// Listing identifiers discovered across all pages
    pub discovered: usize,
    /// Listings written to the store
    pub persisted: usize,
    /// Listings rebuilt from stored content instead of being fetched
    pub reused: usize,
    /// Listings that failed to fetch, parse or persist
    pub failed: usize,
}

/// How one listing task ended
enum Outcome {
    Fetched,
    Reused,
}

/// Shared state handed to every listing task
struct TaskContext<S, P> {
    source: Arc<S>,
    parser: Arc<P>,
    store: RecordStore,
    existing: HashMap<String, Listing>,
    now: DateTime<Utc>,
}

/// Walks the paginated search results and keeps the listing table current
pub struct Crawler<S, P> {
    source: Arc<S>,
    parser: Arc<P>,
    store: RecordStore,
    params: CrawlParams,
}

impl<S, P> Crawler<S, P>
where
    S: PageSource + 'static,
    P: ListingParser + 'static,
{
    pub fn new(source: S, parser: P, store: RecordStore, params: CrawlParams) -> Self {
        Self {
            source: Arc::new(source),
            parser: Arc::new(parser),
            store,
            params,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn run(&self) -> Result<CrawlReport> {
        self.run_at(Utc::now()).await
    }

    /// Run a crawl where `now` becomes `first_seen` for new listings.
    ///
    /// Per-listing failures are logged and counted; only a failed discovery
    /// request or link extraction aborts the run, after in-flight tasks finish.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CrawlReport> {
        info!("Starting crawl from {}", self.source.source_name());

        let existing: HashMap<String, Listing> = self
            .store
            .all::<Listing>()
            .await?
            .into_iter()
            .map(|l| (l.url.clone(), l))
            .collect();
        info!("Loaded {} stored listings", existing.len());

        let ctx = Arc::new(TaskContext {
            source: Arc::clone(&self.source),
            parser: Arc::clone(&self.parser),
            store: self.store.clone(),
            existing,
            now,
        });
        let permits = Arc::new(Semaphore::new(self.params.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut report = CrawlReport::default();

        let discovery = self
            .discover(&ctx, &permits, &mut tasks, &mut report)
            .await;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Outcome::Fetched))) => report.persisted += 1,
                Ok((_, Ok(Outcome::Reused))) => {
                    report.persisted += 1;
                    report.reused += 1;
                }
                Ok((url, Err(e))) => {
                    warn!("Failed to process {}: {}", url, e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Listing task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        discovery?;
        info!(
            "Crawl complete: {} discovered, {} persisted ({} reused), {} failed",
            report.discovered, report.persisted, report.reused, report.failed
        );
        Ok(report)
    }

    async fn discover(
        &self,
        ctx: &Arc<TaskContext<S, P>>,
        permits: &Arc<Semaphore>,
        tasks: &mut JoinSet<(String, Result<Outcome>)>,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let mut offset = 0;
        loop {
            let page = self.source.fetch(&self.params.page_path(offset)).await?;
            let parser = Arc::clone(&self.parser);
            let links =
                tokio::task::spawn_blocking(move || parser.parse_links(&page)).await??;
            if links.is_empty() {
                return Ok(());
            }

            offset += links.len();
            report.pages += 1;
            report.discovered += links.len();
            info!("Got {} new links", links.len());

            for url in links {
                let ctx = Arc::clone(ctx);
                let permits = Arc::clone(permits);
                tasks.spawn(async move {
                    // the semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    let result = process_listing(&ctx, &url).await;
                    (url, result)
                });
            }
        }
    }
}

async fn process_listing<S, P>(ctx: &TaskContext<S, P>, url: &str) -> Result<Outcome>
where
    S: PageSource,
    P: ListingParser + 'static,
{
    info!("Started parsing {}", url);

    let stored = ctx.existing.get(url);
    let first_seen = stored.and_then(|l| l.first_seen).unwrap_or(ctx.now);
    let (content, outcome) = match stored.and_then(|l| l.doc.clone()) {
        Some(doc) => (doc, Outcome::Reused),
        None => (ctx.source.fetch(url).await?, Outcome::Fetched),
    };

    let parser = Arc::clone(&ctx.parser);
    let (url, content, fields) = {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let fields = parser.parse_listing(&url, &content);
            (url, content, fields)
        })
        .await?
    };
    let listing = Listing::from_fields(url.clone(), content, fields?, Utc::now(), first_seen);

    ctx.store.upsert(listing).await?;
    info!("Finished parsing {}", url);
    Ok(outcome)
}
