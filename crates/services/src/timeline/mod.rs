//! Timeline state and the store that keeps it persisted.

mod state;
mod store;

pub use state::{ActionOutcome, TimelineAction, TimelineState};
pub use store::TimelineStore;
