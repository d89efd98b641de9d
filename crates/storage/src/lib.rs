#![forbid(unsafe_code)]

pub mod document;
pub mod repository;
pub mod sqlite;

pub use document::{DocumentError, PlanDocument};
pub use repository::{
    CompletionRepository, InMemoryRepository, PlanRepository, Storage, StorageError,
};
