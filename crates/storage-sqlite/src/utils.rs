//! Helpers shared by the repositories.

use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::StorageError;

/// Chunk size for `IN (...)` lists, below SQLite's parameter limit.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Split a slice into chunks that fit one `IN (...)` query.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn parse_day(value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, DAY_FORMAT)
        .map_err(|e| StorageError::SerializationError(format!("bad date '{}': {}", value, e)))
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("bad timestamp '{}': {}", value, e)))
}
