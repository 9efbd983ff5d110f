pub mod coordinate;

use crate::error::Result;
use crate::store::entity::{
    required, Entity, Field, FieldValue, FieldValues, StorageType, UpsertMode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use coordinate::{Coordinate, COORDINATE_TAG};

/// Fields the listing parser extracts from a detail page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFields {
    /// Asking price with currency symbols and separators removed
    pub price: Option<i64>,
    pub address: String,
    pub location: Option<Coordinate>,
    pub beds: Option<i64>,
    pub bathrooms: Option<i64>,
    /// Floor area in square metres
    pub area: Option<f64>,
    pub added: Option<NaiveDate>,
}

/// A property listing keyed by its detail-page path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub url: String,
    /// Raw detail-page content, reused on later crawls instead of re-fetching
    pub doc: Option<String>,
    pub price: Option<i64>,
    pub address: Option<String>,
    pub location: Option<Coordinate>,
    pub beds: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area: Option<f64>,
    pub added: Option<NaiveDate>,
    pub scraped_on: Option<DateTime<Utc>>,
    pub first_seen: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn from_fields(
        url: String,
        doc: String,
        fields: ListingFields,
        scraped_on: DateTime<Utc>,
        first_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            url,
            doc: Some(doc),
            price: fields.price,
            address: Some(fields.address),
            location: fields.location,
            beds: fields.beds,
            bathrooms: fields.bathrooms,
            area: fields.area,
            added: fields.added,
            scraped_on: Some(scraped_on),
            first_seen: Some(first_seen),
        }
    }
}

fn opt<T>(value: Option<T>, wrap: impl FnOnce(T) -> FieldValue) -> FieldValue {
    value.map(wrap).unwrap_or(FieldValue::Null)
}

impl Entity for Listing {
    const NAME: &'static str = "Listing";
    const FIELDS: &'static [Field] = &[
        Field::key("url", StorageType::Text),
        Field::new("doc", StorageType::Text),
        Field::new("price", StorageType::Integer),
        Field::new("address", StorageType::Text),
        Field::new("location", StorageType::Coordinate),
        Field::new("beds", StorageType::Integer),
        Field::new("bathrooms", StorageType::Integer),
        Field::new("area", StorageType::Real),
        Field::new("added", StorageType::Date),
        Field::new("scraped_on", StorageType::DateTime),
        Field::new("first_seen", StorageType::DateTime),
    ];
    // Re-crawls refresh every fetched field; first_seen is carried over by the crawler.
    const UPSERT: UpsertMode = UpsertMode::Replace;

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(self.url.clone()),
            opt(self.doc.clone(), FieldValue::Text),
            opt(self.price, FieldValue::Integer),
            opt(self.address.clone(), FieldValue::Text),
            opt(self.location, FieldValue::Coordinate),
            opt(self.beds, FieldValue::Integer),
            opt(self.bathrooms, FieldValue::Integer),
            opt(self.area, FieldValue::Real),
            opt(self.added, FieldValue::Date),
            opt(self.scraped_on, FieldValue::DateTime),
            opt(self.first_seen, FieldValue::DateTime),
        ]
    }

    fn from_values(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            url: values.required_text("url")?,
            doc: values.text("doc")?,
            price: values.integer("price")?,
            address: values.text("address")?,
            location: values.coordinate("location")?,
            beds: values.integer("beds")?,
            bathrooms: values.integer("bathrooms")?,
            area: values.real("area")?,
            added: values.date("added")?,
            scraped_on: values.datetime("scraped_on")?,
            first_seen: values.datetime("first_seen")?,
        })
    }
}

/// Travel estimate from a listing's location to a destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub listing_url: String,
    pub mode: String,
    /// Listing location at the time of enrichment
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub duration_secs: i64,
    pub duration_text: String,
    pub distance_m: i64,
    pub distance_text: String,
}

impl Entity for Distance {
    const NAME: &'static str = "Distance";
    const FIELDS: &'static [Field] = &[
        Field::key("listing_url", StorageType::Text),
        Field::key("mode", StorageType::Text),
        Field::new("origin", StorageType::Coordinate),
        Field::key("destination", StorageType::Coordinate),
        Field::new("duration_secs", StorageType::Integer),
        Field::new("duration_text", StorageType::Text),
        Field::new("distance_m", StorageType::Integer),
        Field::new("distance_text", StorageType::Text),
    ];
    // Travel estimates are computed once per (listing, mode, destination).
    const UPSERT: UpsertMode = UpsertMode::Ignore;

    fn to_values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Text(self.listing_url.clone()),
            FieldValue::Text(self.mode.clone()),
            FieldValue::Coordinate(self.origin),
            FieldValue::Coordinate(self.destination),
            FieldValue::Integer(self.duration_secs),
            FieldValue::Text(self.duration_text.clone()),
            FieldValue::Integer(self.distance_m),
            FieldValue::Text(self.distance_text.clone()),
        ]
    }

    fn from_values(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            listing_url: values.required_text("listing_url")?,
            mode: values.required_text("mode")?,
            origin: required(values.coordinate("origin")?, "origin", COORDINATE_TAG)?,
            destination: required(values.coordinate("destination")?, "destination", COORDINATE_TAG)?,
            duration_secs: required(values.integer("duration_secs")?, "duration_secs", "integer")?,
            duration_text: values.required_text("duration_text")?,
            distance_m: required(values.integer("distance_m")?, "distance_m", "integer")?,
            distance_text: values.required_text("distance_text")?,
        })
    }
}
