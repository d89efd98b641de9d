//! Shared error types for the services crate.

use thiserror::Error;

use storage::DocumentError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use thesis_core::model::{
    ActivityError, ActivityId, CellKey, CompletionError, PlanError, PlanId,
};

/// Errors emitted by the timeline store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimelineError {
    #[error("unknown activity {0}")]
    UnknownActivity(ActivityId),
    #[error("cell {0} is outside its activity's span")]
    CellOutsideSpan(CellKey),
    #[error("plan {0} does not exist")]
    MissingPlan(PlanId),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Errors emitted by `ReportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("unknown report format: {0}")]
    UnknownFormat(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}
