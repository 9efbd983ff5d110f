use crate::error::{Error, Result};
use crate::models::{Coordinate, Distance, Listing};
use crate::store::RecordStore;
use super::matrix::{DistanceMatrix, MatrixElement, MatrixRequest, RoutingPreferences, STATUS_OK};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

/// The API's per-request limit on origins
pub const MAX_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Stored listings scanned
    pub scanned: usize,
    /// Batched requests sent
    pub requests: usize,
    /// New distance rows written
    pub written: usize,
    /// Elements the API could not route
    pub skipped: usize,
}

/// Fills in travel estimates for listings that do not have one yet
pub struct DistanceBatcher<C> {
    client: C,
    store: RecordStore,
    batch_size: usize,
    preferences: RoutingPreferences,
}

impl<C: DistanceMatrix> DistanceBatcher<C> {
    pub fn new(client: C, store: RecordStore) -> Self {
        Self {
            client,
            store,
            batch_size: MAX_BATCH_SIZE,
            preferences: RoutingPreferences::default(),
        }
    }

    /// Smaller batches than the API limit; `0` and values above it are clamped.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn with_preferences(mut self, preferences: RoutingPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Enrich every stored listing lacking a `mode` estimate to `destination`.
    ///
    /// Each batch is committed on its own. A non-OK top-level status stops the
    /// run with [`Error::BatchApi`]; batches written before it are kept.
    pub async fn enrich(
        &self,
        mode: &str,
        destination: Coordinate,
        arrival_time: DateTime<Utc>,
    ) -> Result<EnrichReport> {
        let existing = self.store.distance_origins(mode, destination).await?;
        info!(
            "{} origins already have {} estimates to {}",
            existing.len(),
            mode,
            destination
        );

        let mut report = EnrichReport::default();
        let mut offset = 0;
        loop {
            let listings = self.store.page::<Listing>(self.batch_size, offset).await?;
            if listings.is_empty() {
                break;
            }
            let page_len = listings.len();
            offset += page_len;
            report.scanned += page_len;

            let pending = pending(listings, &existing);
            info!(
                "Querying routes for listings without data: {} out of {}",
                pending.len(),
                page_len
            );
            if pending.is_empty() {
                continue;
            }

            let (written, skipped) = self
                .enrich_batch(&pending, mode, destination, arrival_time)
                .await?;
            report.requests += 1;
            report.written += written;
            report.skipped += skipped;
        }

        info!(
            "Enrichment complete: {} scanned, {} requests, {} written, {} skipped",
            report.scanned, report.requests, report.written, report.skipped
        );
        Ok(report)
    }

    /// One request for `pending`; returns (rows written, elements skipped).
    async fn enrich_batch(
        &self,
        pending: &[(String, Coordinate)],
        mode: &str,
        destination: Coordinate,
        arrival_time: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let request = MatrixRequest {
            origins: pending.iter().map(|(_, origin)| *origin).collect(),
            destination,
            mode: mode.to_string(),
            arrival_time,
            preferences: self.preferences.clone(),
        };
        let response = self.client.distance_matrix(&request).await?;
        if response.status != STATUS_OK {
            let detail = match response.error_message {
                Some(message) => format!("{}: {}", response.status, message),
                None => response.status,
            };
            return Err(Error::BatchApi(detail));
        }

        let mut rows = response.rows.into_iter();
        let mut distances = Vec::with_capacity(pending.len());
        let mut skipped = 0;
        for (url, origin) in pending {
            let element = rows.next().and_then(|row| row.elements.into_iter().next());
            match to_distance(url, *origin, element, mode, destination) {
                Ok(distance) => distances.push(distance),
                Err(e) => {
                    warn!("Skipping {} from {}: {}", url, origin, e);
                    skipped += 1;
                }
            }
        }

        let written = self.store.upsert_all(distances).await?;
        Ok((written, skipped))
    }
}

/// Listings with a location that has no estimate yet
fn pending(listings: Vec<Listing>, existing: &HashSet<Coordinate>) -> Vec<(String, Coordinate)> {
    listings
        .into_iter()
        .filter_map(|l| match l.location {
            Some(location) if !existing.contains(&location) => Some((l.url, location)),
            _ => None,
        })
        .collect()
}

fn to_distance(
    url: &str,
    origin: Coordinate,
    element: Option<MatrixElement>,
    mode: &str,
    destination: Coordinate,
) -> Result<Distance> {
    let element_error = |status: String| Error::Element {
        listing_url: url.to_string(),
        origin,
        status,
    };

    let element = element.ok_or_else(|| element_error("MISSING".to_string()))?;
    if element.status != STATUS_OK {
        return Err(element_error(element.status));
    }
    let (Some(duration), Some(distance)) = (element.duration, element.distance) else {
        return Err(element_error("OK without duration or distance".to_string()));
    };

    Ok(Distance {
        listing_url: url.to_string(),
        mode: mode.to_string(),
        origin,
        destination,
        duration_secs: duration.value,
        duration_text: duration.text,
        distance_m: distance.value,
        distance_text: distance.text,
    })
}
