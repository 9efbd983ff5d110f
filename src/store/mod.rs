//! Record store backed by a single SQLite file.

pub mod entity;
pub mod schema;
pub mod session;

use crate::error::Result;
use crate::models::{coordinate, Coordinate, Distance, Listing};
use parking_lot::Mutex;
use rusqlite::params;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

pub use entity::{Entity, UpsertMode};
pub use schema::{create_or_alter_table, MigrationReport};
pub use session::Session;

/// Shared handle to the record store.
///
/// Cloning is cheap. All access goes through one session behind a mutex and
/// runs on the blocking thread pool, so writes from concurrent tasks are
/// serialized here rather than by callers.
#[derive(Clone)]
pub struct RecordStore {
    session: Arc<Mutex<Session>>,
}

impl RecordStore {
    /// Opens (or creates) the store at `path` and migrates every table.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_session(Session::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_session(Session::open_in_memory()?)
    }

    pub fn from_session(mut session: Session) -> Result<Self> {
        migrate(&mut session)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }

    async fn with_session<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session.lock();
            f(&mut guard)
        })
        .await?
    }

    pub async fn upsert<T: Entity>(&self, record: T) -> Result<usize> {
        self.upsert_all(vec![record]).await
    }

    /// Writes all records in one transaction; nothing is kept if any write fails.
    pub async fn upsert_all<T: Entity>(&self, records: Vec<T>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.with_session(move |session| session.write_all(&records))
            .await
    }

    pub async fn all<T: Entity>(&self) -> Result<Vec<T>> {
        self.with_session(|session| session.select::<T, _>("", []))
            .await
    }

    /// One page of `T` rows, ordered by primary key.
    pub async fn page<T: Entity>(&self, limit: usize, offset: usize) -> Result<Vec<T>> {
        let order: Vec<&str> = T::FIELDS.iter().filter(|f| f.key).map(|f| f.name).collect();
        let clause = format!("ORDER BY {} LIMIT ?1 OFFSET ?2", order.join(", "));
        self.with_session(move |session| {
            session.select::<T, _>(&clause, params![limit as i64, offset as i64])
        })
        .await
    }

    pub async fn listing(&self, url: &str) -> Result<Option<Listing>> {
        let url = url.to_string();
        let mut found = self
            .with_session(move |session| session.select::<Listing, _>("WHERE url = ?1", params![url]))
            .await?;
        Ok(found.pop())
    }

    /// Origins already enriched for `mode` and `destination`.
    pub async fn distance_origins(
        &self,
        mode: &str,
        destination: Coordinate,
    ) -> Result<HashSet<Coordinate>> {
        let mode = mode.to_string();
        let rows = self
            .with_session(move |session| {
                session.select::<Distance, _>(
                    "WHERE mode = ?1 AND destination = ?2",
                    params![mode, coordinate::encode(&destination)],
                )
            })
            .await?;
        Ok(rows.into_iter().map(|d| d.origin).collect())
    }

    /// Every distance row grouped by listing url.
    pub async fn distances_by_listing(&self) -> Result<HashMap<String, Vec<Distance>>> {
        let rows = self.all::<Distance>().await?;
        let mut grouped: HashMap<String, Vec<Distance>> = HashMap::new();
        for row in rows {
            grouped.entry(row.listing_url.clone()).or_default().push(row);
        }
        Ok(grouped)
    }
}

/// Runs create-or-alter for every record definition.
pub fn migrate(session: &mut Session) -> Result<Vec<MigrationReport>> {
    Ok(vec![
        create_or_alter_table::<Listing>(session)?,
        create_or_alter_table::<Distance>(session)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn listing(url: &str, price: i64) -> Listing {
        let now = Utc::now();
        Listing {
            url: url.to_string(),
            doc: Some(format!("<html>{url}</html>")),
            price: Some(price),
            address: Some("1 Main St".to_string()),
            location: Some(Coordinate::new(53.3, -6.2)),
            beds: Some(2),
            bathrooms: None,
            area: Some(71.5),
            added: None,
            scraped_on: Some(now),
            first_seen: Some(now - Duration::days(3)),
        }
    }

    fn distance(url: &str, secs: i64) -> Distance {
        Distance {
            listing_url: url.to_string(),
            mode: "transit".to_string(),
            origin: Coordinate::new(53.3, -6.2),
            destination: Coordinate::new(53.34, -6.26),
            duration_secs: secs,
            duration_text: format!("{} mins", secs / 60),
            distance_m: 4200,
            distance_text: "4.2 km".to_string(),
        }
    }

    #[tokio::test]
    async fn listing_writes_replace_existing_rows() {
        let store = RecordStore::open_in_memory().unwrap();
        store.upsert(listing("/a", 1000)).await.unwrap();
        store.upsert(listing("/a", 1200)).await.unwrap();

        let all = store.all::<Listing>().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].price, Some(1200));
        assert_eq!(all[0].location, Some(Coordinate::new(53.3, -6.2)));
    }

    #[tokio::test]
    async fn distance_writes_ignore_existing_keys() {
        let store = RecordStore::open_in_memory().unwrap();
        assert_eq!(store.upsert(distance("/a", 900)).await.unwrap(), 1);
        assert_eq!(store.upsert(distance("/a", 1800)).await.unwrap(), 0);

        let all = store.all::<Distance>().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].duration_secs, 900);
    }

    #[tokio::test]
    async fn loads_enriched_origins_for_mode_and_destination() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut walking = distance("/b", 600);
        walking.mode = "walking".to_string();
        store
            .upsert_all(vec![distance("/a", 900), walking])
            .await
            .unwrap();

        let origins = store
            .distance_origins("transit", Coordinate::new(53.34, -6.26))
            .await
            .unwrap();
        assert_eq!(origins.len(), 1);
        assert!(origins.contains(&Coordinate::new(53.3, -6.2)));

        let other = store
            .distance_origins("transit", Coordinate::new(0.0, 0.0))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn pages_in_key_order() {
        let store = RecordStore::open_in_memory().unwrap();
        store
            .upsert_all(vec![listing("/c", 1), listing("/a", 2), listing("/b", 3)])
            .await
            .unwrap();

        let first = store.page::<Listing>(2, 0).await.unwrap();
        let second = store.page::<Listing>(2, 2).await.unwrap();
        let urls: Vec<_> = first.iter().chain(&second).map(|l| l.url.as_str()).collect();
        assert_eq!(urls, ["/a", "/b", "/c"]);
        assert!(store.page::<Listing>(2, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.db");
        {
            let store = RecordStore::open(&path).unwrap();
            store.upsert(listing("/a", 1000)).await.unwrap();
            store.upsert(distance("/a", 900)).await.unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        let found = store.listing("/a").await.unwrap().unwrap();
        assert_eq!(found.price, Some(1000));
        assert!(store.listing("/missing").await.unwrap().is_none());

        let grouped = store.distances_by_listing().await.unwrap();
        assert_eq!(grouped["/a"].len(), 1);
    }
}
