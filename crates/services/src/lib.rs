#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod report_service;
pub mod timeline;

pub use thesis_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ReportError, TimelineError};
pub use report_service::{Report, ReportFormat, ReportService};
pub use timeline::{ActionOutcome, TimelineAction, TimelineState, TimelineStore};
