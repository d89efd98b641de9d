use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use thesis_core::model::{ActivityId, CellKey, DayIndex, Plan, PlanId, WeekIndex};

use crate::document::PlanDocument;
use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn plan_id_to_i64(id: PlanId) -> Result<i64, StorageError> {
    u64_to_i64("plan_id", id.value())
}

pub(crate) fn plan_id_from_i64(v: i64) -> Result<PlanId, StorageError> {
    Ok(PlanId::new(i64_to_u64("plan_id", v)?))
}

/// Decode a `plans` row (`document`, `version`) into a domain plan.
pub(crate) fn map_plan_row(row: &SqliteRow) -> Result<Plan, StorageError> {
    let raw: String = row.try_get("document").map_err(ser)?;
    let version = i64_to_u64("version", row.try_get::<i64, _>("version").map_err(ser)?)?;
    PlanDocument::from_json(&raw)
        .and_then(|doc| doc.into_plan(version))
        .map_err(ser)
}

/// Decode a `completed_cells` row into a cell key.
pub(crate) fn map_cell_row(row: &SqliteRow) -> Result<CellKey, StorageError> {
    let activity = ActivityId::new(i64_to_u64(
        "activity_id",
        row.try_get::<i64, _>("activity_id").map_err(ser)?,
    )?);
    let week = WeekIndex::try_from(row.try_get::<i64, _>("week").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("week out of range".into()))?;
    let day = DayIndex::try_from(row.try_get::<i64, _>("day").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("day out of range".into()))?;
    Ok(CellKey::new(activity, week, day))
}

/// Foreign key failures mean the owning plan row is missing.
pub(crate) fn map_write_error(err: sqlx::Error) -> StorageError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
    {
        return StorageError::NotFound;
    }
    conn(err)
}
