use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use scout::models::{Listing, ListingFields};
use scout::scrapers::{CrawlParams, Crawler, ListingParser, PageSource};
use scout::store::RecordStore;
use scout::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

struct StaticSite {
    pages: HashMap<String, String>,
    detail_fetches: AtomicUsize,
}

impl StaticSite {
    fn new() -> Self {
        let pages = [
            ("/rent?offset=0", "/a\n/b"),
            ("/rent?offset=2", ""),
            ("/a", "1 Main St|1500"),
            ("/b", "2 Side Rd|1850"),
        ];
        Self {
            pages: pages
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            detail_fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageSource for StaticSite {
    async fn fetch(&self, path: &str) -> Result<String> {
        if !path.contains('?') {
            self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        }
        self.pages.get(path).cloned().ok_or_else(|| Error::Fetch {
            url: path.to_string(),
            reason: "not found".to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// One link per line; detail pages are `address|price`
struct LineParser;

impl ListingParser for LineParser {
    fn parse_links(&self, content: &str) -> Result<Vec<String>> {
        Ok(content.lines().map(str::to_string).collect())
    }

    fn parse_listing(&self, url: &str, content: &str) -> Result<ListingFields> {
        let (address, price) = content.split_once('|').ok_or_else(|| Error::Parse {
            url: url.to_string(),
            reason: "expected address|price".to_string(),
        })?;
        Ok(ListingFields {
            address: address.to_string(),
            price: price.parse().ok(),
            ..ListingFields::default()
        })
    }
}

fn params() -> CrawlParams {
    CrawlParams {
        search_path: "/rent".to_string(),
        concurrency: 4,
        ..CrawlParams::default()
    }
}

async fn sorted_listings(store: &RecordStore) -> Vec<Listing> {
    let mut listings = store.all::<Listing>().await.unwrap();
    listings.sort_by(|a, b| a.url.cmp(&b.url));
    listings
}

#[tokio::test]
async fn crawl_persists_every_listing_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(&dir.path().join("listings.db")).unwrap();
    let crawler = Crawler::new(StaticSite::new(), LineParser, store.clone(), params());

    let report = crawler.run().await.unwrap();
    assert_eq!(report.pages, 1);
    assert_eq!(report.discovered, 2);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.failed, 0);

    let listings = sorted_listings(&store).await;
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].address.as_deref(), Some("1 Main St"));
    assert_eq!(listings[1].price, Some(1850));
    assert!(listings.iter().all(|l| l.scraped_on.is_some()));
    assert_eq!(listings[0].doc.as_deref(), Some("1 Main St|1500"));
}

#[tokio::test]
async fn recrawl_reuses_content_and_keeps_first_seen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listings.db");
    let first_run = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let store = RecordStore::open(&path).unwrap();
    Crawler::new(StaticSite::new(), LineParser, store.clone(), params())
        .run_at(first_run)
        .await
        .unwrap();
    let before = sorted_listings(&store).await;
    drop(store);

    // a fresh handle on the same file, as a later process would have
    let store = RecordStore::open(&path).unwrap();
    let crawler = Crawler::new(StaticSite::new(), LineParser, store.clone(), params());
    let report = crawler.run_at(first_run + Duration::days(7)).await.unwrap();
    assert_eq!(report.persisted, 2);
    assert_eq!(report.reused, 2);
    assert_eq!(crawler.source().detail_fetches.load(Ordering::SeqCst), 0);

    let after = sorted_listings(&store).await;
    assert_eq!(after.len(), 2);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.first_seen, Some(first_run));
        assert_eq!(new.first_seen, old.first_seen);
        assert_eq!(new.address, old.address);
        // every write restamps scraped_on
        assert!(new.scraped_on.is_some());
        assert!(new.scraped_on > old.scraped_on);
    }
}
