//! Travel-time enrichment of stored listings.

pub mod batcher;
pub mod matrix;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};

pub use batcher::{DistanceBatcher, EnrichReport, MAX_BATCH_SIZE};
pub use matrix::{DistanceMatrix, GoogleDistanceMatrix, MatrixRequest, RoutingPreferences};

/// 09:00 on the Monday two weeks after `now`.
///
/// Far enough ahead that estimates do not depend on live traffic, and fixed
/// for a given week so repeated runs ask the same question.
pub fn arrival_time(now: NaiveDateTime) -> NaiveDateTime {
    let days_ahead = 14 - i64::from(now.weekday().num_days_from_monday());
    let day = now.date() + Duration::days(days_ahead);
    day.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
}
