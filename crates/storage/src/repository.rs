use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thesis_core::model::{CellKey, CompletionSet, Plan, PlanId};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: stored version {stored} is not older than {attempted}")]
    Conflict { stored: u64, attempted: u64 },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for plans.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Persist a plan under the given id.
    ///
    /// An existing row is only replaced by a strictly newer version. Two
    /// editors that started from the same version both produce the same next
    /// version, so the second one to write gets a conflict.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` for stale versions, or other storage errors.
    async fn save_plan(&self, id: PlanId, plan: &Plan) -> Result<(), StorageError>;

    /// Persist a plan and replace its completion set in one atomic write.
    ///
    /// Either both are stored or neither is.
    ///
    /// # Errors
    ///
    /// Same as [`PlanRepository::save_plan`], plus completion write failures.
    async fn save_plan_with_completion(
        &self,
        id: PlanId,
        plan: &Plan,
        completion: &CompletionSet,
    ) -> Result<(), StorageError>;

    /// Fetch a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the plan cannot be read or decoded.
    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StorageError>;

    /// List stored plan ids in ascending order, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository cannot be read.
    async fn list_plans(&self, limit: u32) -> Result<Vec<PlanId>, StorageError>;

    /// Delete a plan together with its completion state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such plan exists.
    async fn delete_plan(&self, id: PlanId) -> Result<(), StorageError>;
}

/// Repository contract for the completed-cell set of a plan.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Load every completed cell of a plan. Unknown plans yield an empty set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository cannot be read.
    async fn load_completion(&self, plan: PlanId) -> Result<CompletionSet, StorageError>;

    /// Mark a single cell done or not done.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the plan does not exist.
    async fn set_cell(&self, plan: PlanId, key: CellKey, done: bool) -> Result<(), StorageError>;

    /// Replace the whole completion set of a plan.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the plan does not exist.
    async fn replace_completion(
        &self,
        plan: PlanId,
        completion: &CompletionSet,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    plans: Arc<Mutex<HashMap<PlanId, Plan>>>,
    completion: Arc<Mutex<HashMap<PlanId, CompletionSet>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_version(stored: Option<&Plan>, plan: &Plan) -> Result<(), StorageError> {
        match stored {
            Some(stored) if stored.version() >= plan.version() => Err(StorageError::Conflict {
                stored: stored.version(),
                attempted: plan.version(),
            }),
            _ => Ok(()),
        }
    }

    fn plan_exists(&self, id: PlanId) -> Result<bool, StorageError> {
        let guard = self
            .plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.contains_key(&id))
    }
}

#[async_trait]
impl PlanRepository for InMemoryRepository {
    async fn save_plan(&self, id: PlanId, plan: &Plan) -> Result<(), StorageError> {
        let mut guard = self
            .plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::check_version(guard.get(&id), plan)?;
        guard.insert(id, plan.clone());
        Ok(())
    }

    async fn save_plan_with_completion(
        &self,
        id: PlanId,
        plan: &Plan,
        completion: &CompletionSet,
    ) -> Result<(), StorageError> {
        // Lock order: plans, then completion.
        let mut plans = self
            .plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::check_version(plans.get(&id), plan)?;
        let mut cells = self
            .completion
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        plans.insert(id, plan.clone());
        cells.insert(id, completion.clone());
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StorageError> {
        let guard = self
            .plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_plans(&self, limit: u32) -> Result<Vec<PlanId>, StorageError> {
        let guard = self
            .plans
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut ids: Vec<PlanId> = guard.keys().copied().collect();
        ids.sort();
        ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(ids)
    }

    async fn delete_plan(&self, id: PlanId) -> Result<(), StorageError> {
        {
            let mut guard = self
                .plans
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.remove(&id).ok_or(StorageError::NotFound)?;
        }
        let mut guard = self
            .completion
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn load_completion(&self, plan: PlanId) -> Result<CompletionSet, StorageError> {
        let guard = self
            .completion
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&plan).cloned().unwrap_or_default())
    }

    async fn set_cell(&self, plan: PlanId, key: CellKey, done: bool) -> Result<(), StorageError> {
        if !self.plan_exists(plan)? {
            return Err(StorageError::NotFound);
        }
        let mut guard = self
            .completion
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.entry(plan).or_default().set(key, done);
        Ok(())
    }

    async fn replace_completion(
        &self,
        plan: PlanId,
        completion: &CompletionSet,
    ) -> Result<(), StorageError> {
        if !self.plan_exists(plan)? {
            return Err(StorageError::NotFound);
        }
        let mut guard = self
            .completion
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(plan, completion.clone());
        Ok(())
    }
}

/// Aggregates plan and completion repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub plans: Arc<dyn PlanRepository>,
    pub completion: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let plans: Arc<dyn PlanRepository> = Arc::new(repo.clone());
        let completion: Arc<dyn CompletionRepository> = Arc::new(repo);
        Self { plans, completion }
    }
}
