//! Entity-to-table mapping.
//!
//! Every persisted record type declares a static table of [`Field`]
//! descriptors. The mapper derives DDL, upsert statements and row decoding
//! from that table; composite storage types go through their registered codec.

use crate::error::{Error, Result};
use crate::models::coordinate::{self, Coordinate, COORDINATE_TAG};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Value, ValueRef};
use std::marker::PhantomData;

/// Column storage type, as written in DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Text,
    Integer,
    Real,
    Date,
    DateTime,
    Coordinate,
}

impl StorageType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageType::Text => "text",
            StorageType::Integer => "integer",
            StorageType::Real => "real",
            StorageType::Date => "date",
            StorageType::DateTime => "datetime",
            StorageType::Coordinate => COORDINATE_TAG,
        }
    }
}

/// One entry of a record definition's field-descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub storage: StorageType,
    pub key: bool,
}

impl Field {
    pub const fn new(name: &'static str, storage: StorageType) -> Self {
        Self {
            name,
            storage,
            key: false,
        }
    }

    pub const fn key(name: &'static str, storage: StorageType) -> Self {
        Self {
            name,
            storage,
            key: true,
        }
    }
}

/// Conflict policy applied when a record's key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Overwrite the stored row with the new one
    Replace,
    /// Keep the stored row, drop the new one
    Ignore,
}

impl UpsertMode {
    fn verb(&self) -> &'static str {
        match self {
            UpsertMode::Replace => "INSERT OR REPLACE",
            UpsertMode::Ignore => "INSERT OR IGNORE",
        }
    }
}

/// A typed field value. `Null` is the explicit "unset" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Coordinate(Coordinate),
}

impl FieldValue {
    /// Converts to the value bound into a statement.
    pub fn to_sql(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::Integer(i) => Value::Integer(*i),
            FieldValue::Real(r) => Value::Real(*r),
            FieldValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(dt) => Value::Text(dt.to_rfc3339()),
            FieldValue::Coordinate(c) => Value::Text(coordinate::encode(c)),
        }
    }

    /// Decodes a stored column according to the field's declared storage type.
    pub fn from_sql(field: &Field, raw: ValueRef<'_>) -> Result<Self> {
        let malformed = |value: String, reason: &str| Error::MalformedValue {
            field: field.name.to_string(),
            storage: field.storage.as_sql(),
            value,
            reason: reason.to_string(),
        };

        let text = match raw {
            ValueRef::Null => return Ok(FieldValue::Null),
            ValueRef::Integer(i) => {
                return match field.storage {
                    StorageType::Integer => Ok(FieldValue::Integer(i)),
                    StorageType::Real => Ok(FieldValue::Real(i as f64)),
                    StorageType::Text => Ok(FieldValue::Text(i.to_string())),
                    _ => Err(malformed(i.to_string(), "unexpected integer")),
                };
            }
            ValueRef::Real(r) => {
                return match field.storage {
                    StorageType::Real => Ok(FieldValue::Real(r)),
                    _ => Err(malformed(r.to_string(), "unexpected real")),
                };
            }
            ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|_| malformed(String::from_utf8_lossy(bytes).into_owned(), "invalid utf-8"))?,
            ValueRef::Blob(_) => return Err(malformed("<blob>".to_string(), "unexpected blob")),
        };

        match field.storage {
            StorageType::Text => Ok(FieldValue::Text(text)),
            StorageType::Coordinate => match coordinate::decode(&text) {
                Ok(c) => Ok(FieldValue::Coordinate(c)),
                Err(Error::MalformedValue { reason, .. }) => Err(malformed(text, &reason)),
                Err(other) => Err(other),
            },
            StorageType::Date => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|e| malformed(text, &e.to_string())),
            StorageType::DateTime => DateTime::parse_from_rfc3339(&text)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| malformed(text, &e.to_string())),
            StorageType::Integer => text
                .trim()
                .parse()
                .map(FieldValue::Integer)
                .map_err(|_| malformed(text, "not an integer")),
            StorageType::Real => text
                .trim()
                .parse()
                .map(FieldValue::Real)
                .map_err(|_| malformed(text, "not a real")),
        }
    }
}

/// A persisted record definition.
pub trait Entity: Sized + Send + 'static {
    /// Type name; the table name is its lower-cased form
    const NAME: &'static str;
    /// Field descriptors in column order
    const FIELDS: &'static [Field];
    const UPSERT: UpsertMode;

    /// Values in `FIELDS` order
    fn to_values(&self) -> Vec<FieldValue>;

    fn from_values(values: FieldValues) -> Result<Self>;
}

/// Decoded values of one row, indexed by `T::FIELDS` order.
#[derive(Debug)]
pub struct FieldValues {
    fields: &'static [Field],
    values: Vec<FieldValue>,
}

impl FieldValues {
    pub fn new(fields: &'static [Field], values: Vec<FieldValue>) -> Self {
        Self { fields, values }
    }

    fn take(&mut self, name: &str) -> FieldValue {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .and_then(|idx| self.values.get_mut(idx))
            .map(|slot| std::mem::replace(slot, FieldValue::Null))
            .unwrap_or(FieldValue::Null)
    }

    fn mismatch(name: &str, expected: &'static str, got: FieldValue) -> Error {
        Error::MalformedValue {
            field: name.to_string(),
            storage: expected,
            value: format!("{got:?}"),
            reason: "type mismatch".to_string(),
        }
    }

    pub fn text(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::Text(s) => Ok(Some(s)),
            other => Err(Self::mismatch(name, "text", other)),
        }
    }

    /// A text field that must be present, such as a key column
    pub fn required_text(&mut self, name: &str) -> Result<String> {
        required(self.text(name)?, name, "text")
    }

    pub fn integer(&mut self, name: &str) -> Result<Option<i64>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::Integer(i) => Ok(Some(i)),
            other => Err(Self::mismatch(name, "integer", other)),
        }
    }

    pub fn real(&mut self, name: &str) -> Result<Option<f64>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::Real(r) => Ok(Some(r)),
            FieldValue::Integer(i) => Ok(Some(i as f64)),
            other => Err(Self::mismatch(name, "real", other)),
        }
    }

    pub fn date(&mut self, name: &str) -> Result<Option<NaiveDate>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::Date(d) => Ok(Some(d)),
            other => Err(Self::mismatch(name, "date", other)),
        }
    }

    pub fn datetime(&mut self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::DateTime(dt) => Ok(Some(dt)),
            other => Err(Self::mismatch(name, "datetime", other)),
        }
    }

    pub fn coordinate(&mut self, name: &str) -> Result<Option<Coordinate>> {
        match self.take(name) {
            FieldValue::Null => Ok(None),
            FieldValue::Coordinate(c) => Ok(Some(c)),
            other => Err(Self::mismatch(name, COORDINATE_TAG, other)),
        }
    }
}

/// Rejects the unset sentinel for fields a record cannot do without.
pub fn required<V>(value: Option<V>, field: &str, storage: &'static str) -> Result<V> {
    value.ok_or_else(|| Error::MalformedValue {
        field: field.to_string(),
        storage,
        value: "NULL".to_string(),
        reason: "required field is unset".to_string(),
    })
}

pub fn table_name<T: Entity>() -> String {
    T::NAME.to_lowercase()
}

pub fn create_table_statement<T: Entity>() -> String {
    let keys: Vec<&str> = T::FIELDS.iter().filter(|f| f.key).map(|f| f.name).collect();
    let inline_key = keys.len() == 1;

    let mut columns: Vec<String> = T::FIELDS
        .iter()
        .map(|f| {
            if f.key && inline_key {
                format!("{} {} PRIMARY KEY", f.name, f.storage.as_sql())
            } else {
                format!("{} {}", f.name, f.storage.as_sql())
            }
        })
        .collect();
    if keys.len() > 1 {
        columns.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table_name::<T>(),
        columns.join(", ")
    )
}

pub fn upsert_statement<T: Entity>() -> String {
    let names: Vec<&str> = T::FIELDS.iter().map(|f| f.name).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    format!(
        "{} INTO {} ({}) VALUES ({});",
        T::UPSERT.verb(),
        table_name::<T>(),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Statement parameters for `record`, in the order `upsert_statement` expects.
pub fn to_params<T: Entity>(record: &T) -> Vec<Value> {
    record.to_values().iter().map(FieldValue::to_sql).collect()
}

/// Column-to-field resolution for one query shape.
///
/// Built once from the statement's column names, then reused for every row.
/// Columns that match no field are ignored; fields with no column decode as
/// `Null`.
pub struct RowDecoder<T> {
    slots: Vec<Option<usize>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RowDecoder<T> {
    pub fn resolve<S: AsRef<str>>(columns: &[S]) -> Self {
        let slots = columns
            .iter()
            .map(|col| T::FIELDS.iter().position(|f| f.name == col.as_ref()))
            .collect();
        Self {
            slots,
            _entity: PhantomData,
        }
    }

    pub fn decode_row(&self, row: &rusqlite::Row<'_>) -> Result<T> {
        let mut values = vec![FieldValue::Null; T::FIELDS.len()];
        for (column, slot) in self.slots.iter().enumerate() {
            if let Some(idx) = *slot {
                values[idx] = FieldValue::from_sql(&T::FIELDS[idx], row.get_ref(column)?)?;
            }
        }
        T::from_values(FieldValues::new(T::FIELDS, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Distance, Listing};
    use rusqlite::Connection;

    #[test]
    fn table_names_are_lower_cased_type_names() {
        assert_eq!(table_name::<Listing>(), "listing");
        assert_eq!(table_name::<Distance>(), "distance");
    }

    #[test]
    fn single_key_is_declared_inline() {
        let ddl = create_table_statement::<Listing>();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS listing (url text PRIMARY KEY, doc text,"));
        assert!(ddl.contains("location Coordinate"));
        assert!(ddl.contains("first_seen datetime"));
        assert!(!ddl.contains("PRIMARY KEY ("));
    }

    #[test]
    fn composite_key_is_a_table_constraint() {
        let ddl = create_table_statement::<Distance>();
        assert!(ddl.contains("listing_url text, mode text"));
        assert!(ddl.ends_with("PRIMARY KEY (listing_url, mode, destination));"));
    }

    #[test]
    fn upsert_statements_follow_declared_mode() {
        let listing = upsert_statement::<Listing>();
        assert!(listing.starts_with("INSERT OR REPLACE INTO listing (url, doc, price,"));
        assert!(listing.ends_with("VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);"));

        let distance = upsert_statement::<Distance>();
        assert!(distance.starts_with("INSERT OR IGNORE INTO distance (listing_url, mode, origin,"));
    }

    #[test]
    fn decodes_columns_by_name_regardless_of_order() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE listing (address text, location Coordinate, url text, beds integer, junk text);
             INSERT INTO listing VALUES ('1 Main St', '53.3000000;-6.2000000', '/a', 3, 'x');",
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT * FROM listing").unwrap();
        let decoder = RowDecoder::<Listing>::resolve(&stmt.column_names());
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        let listing = decoder.decode_row(row).unwrap();

        assert_eq!(listing.url, "/a");
        assert_eq!(listing.address.as_deref(), Some("1 Main St"));
        assert_eq!(listing.location, Some(Coordinate::new(53.3, -6.2)));
        assert_eq!(listing.beds, Some(3));
        // declared but absent columns are unset
        assert_eq!(listing.doc, None);
        assert_eq!(listing.price, None);
        assert_eq!(listing.first_seen, None);
    }

    #[test]
    fn corrupt_coordinate_fails_the_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE listing (url text, location Coordinate);
             INSERT INTO listing VALUES ('/a', 'not-a-point');",
        )
        .unwrap();

        let mut stmt = conn.prepare("SELECT url, location FROM listing").unwrap();
        let decoder = RowDecoder::<Listing>::resolve(&stmt.column_names());
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();

        match decoder.decode_row(row) {
            Err(Error::MalformedValue { field, storage, value, .. }) => {
                assert_eq!(field, "location");
                assert_eq!(storage, "Coordinate");
                assert_eq!(value, "not-a-point");
            }
            other => panic!("expected malformed value, got {other:?}"),
        }
    }

    #[test]
    fn datetimes_and_dates_round_trip_through_text() {
        let field = Field::new("added", StorageType::Date);
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let Value::Text(text) = FieldValue::Date(date).to_sql() else {
            panic!("dates are stored as text");
        };
        assert_eq!(text, "2024-02-29");
        assert_eq!(
            FieldValue::from_sql(&field, ValueRef::Text(text.as_bytes())).unwrap(),
            FieldValue::Date(date)
        );

        let field = Field::new("scraped_on", StorageType::DateTime);
        let now = Utc::now();
        let Value::Text(text) = FieldValue::DateTime(now).to_sql() else {
            panic!("datetimes are stored as text");
        };
        assert_eq!(
            FieldValue::from_sql(&field, ValueRef::Text(text.as_bytes())).unwrap(),
            FieldValue::DateTime(now)
        );
    }
}
