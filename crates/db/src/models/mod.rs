//! Entity models and DTOs.

pub mod delivery_job;
pub mod notification;
pub mod preference;

use std::str::FromStr;

use emporia_core::error::CoreError;
use sqlx::postgres::PgRow;
use sqlx::Row;

/// Decode a TEXT column into one of the closed core enums.
pub(crate) fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = CoreError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: CoreError| decode_error(column, e))
}

pub(crate) fn decode_error(column: &str, e: CoreError) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    }
}
