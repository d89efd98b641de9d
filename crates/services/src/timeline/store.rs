use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use storage::PlanDocument;
use storage::repository::{CompletionRepository, PlanRepository, StorageError};
use thesis_core::model::{ActivityId, CellKey, CompletionSet, Plan, PlanId};
use thesis_core::progress::ProgressSummary;

use super::state::{ActionOutcome, Persist, TimelineAction, TimelineState};
use crate::error::TimelineError;

/// Owns the timeline state of one plan and keeps it in step with storage.
///
/// Every action is applied to a copy of the state first. The copy only
/// replaces the live state once the repositories accepted the write, so a
/// failed save never leaves the chart showing something that was not stored.
pub struct TimelineStore {
    plan_id: PlanId,
    plans: Arc<dyn PlanRepository>,
    completion: Arc<dyn CompletionRepository>,
    state: Mutex<TimelineState>,
}

impl TimelineStore {
    /// Load the plan, seeding the default thesis plan if it does not exist yet.
    ///
    /// Completed cells that no longer fit the stored plan are dropped and the
    /// cleaned set is written back.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::Storage` if the repositories cannot be read or
    /// written.
    pub async fn open(
        plan_id: PlanId,
        plans: Arc<dyn PlanRepository>,
        completion: Arc<dyn CompletionRepository>,
    ) -> Result<Self, TimelineError> {
        let plan = match plans.get_plan(plan_id).await? {
            Some(plan) => plan,
            None => seed_plan(plan_id, plans.as_ref()).await?,
        };
        let state = load_state(plan_id, plan, completion.as_ref()).await?;

        Ok(Self {
            plan_id,
            plans,
            completion,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// A copy of the current state for rendering.
    pub async fn snapshot(&self) -> TimelineState {
        self.state.lock().await.clone()
    }

    /// Apply an action and persist its effect.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the action, or `TimelineError::Storage`
    /// if persisting failed. The live state is unchanged in both cases.
    pub async fn dispatch(&self, action: TimelineAction) -> Result<ActionOutcome, TimelineError> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let reduced = next.reduce(action)?;
        self.persist(reduced.persist, &next).await?;
        *guard = next;
        debug!(plan = %self.plan_id, outcome = ?reduced.outcome, "timeline action applied");
        Ok(reduced.outcome)
    }

    /// Flip one cell. Returns whether it is now done.
    ///
    /// # Errors
    ///
    /// See [`TimelineStore::dispatch`].
    pub async fn toggle(&self, key: CellKey) -> Result<bool, TimelineError> {
        match self.dispatch(TimelineAction::ToggleCell(key)).await? {
            ActionOutcome::Cell { done, .. } => Ok(done),
            _ => Ok(self.state.lock().await.is_done(&key)),
        }
    }

    /// # Errors
    ///
    /// Returns `TimelineError::UnknownActivity` if the id is not in the plan.
    pub async fn activity_progress(&self, activity: ActivityId) -> Result<f64, TimelineError> {
        self.state.lock().await.activity_progress(activity)
    }

    pub async fn summary(&self) -> ProgressSummary {
        self.state.lock().await.plan_summary()
    }

    /// Completion set as `{"<activity>-<week>-<day>": true}` JSON.
    pub async fn export_completion_json(&self) -> String {
        self.state.lock().await.completion().to_json_string()
    }

    /// Replace the completion set from its JSON form. Cells that do not fit
    /// the plan are dropped.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::Completion` for malformed JSON or keys, or a
    /// storage error.
    pub async fn import_completion_json(&self, raw: &str) -> Result<ActionOutcome, TimelineError> {
        let imported = CompletionSet::from_json_str(raw)?;
        self.dispatch(TimelineAction::ImportCompletion(imported))
            .await
    }

    /// The plan as a pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::Document` if serialization fails.
    pub async fn export_plan_json(&self) -> Result<String, TimelineError> {
        let state = self.state.lock().await;
        Ok(PlanDocument::from_plan(state.plan()).to_json_pretty()?)
    }

    /// Re-read plan and completion from storage, discarding the live state.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::MissingPlan` if the plan was deleted meanwhile.
    pub async fn reload(&self) -> Result<(), TimelineError> {
        let plan = self
            .plans
            .get_plan(self.plan_id)
            .await?
            .ok_or(TimelineError::MissingPlan(self.plan_id))?;
        let state = load_state(self.plan_id, plan, self.completion.as_ref()).await?;
        *self.state.lock().await = state;
        Ok(())
    }

    async fn persist(&self, persist: Persist, next: &TimelineState) -> Result<(), TimelineError> {
        match persist {
            Persist::Nothing => {}
            Persist::Cell { key, done } => {
                self.completion.set_cell(self.plan_id, key, done).await?;
            }
            Persist::Completion => {
                self.completion
                    .replace_completion(self.plan_id, next.completion())
                    .await?;
            }
            Persist::Plan => {
                self.plans.save_plan(self.plan_id, next.plan()).await?;
            }
            Persist::PlanAndCompletion => {
                self.plans
                    .save_plan_with_completion(self.plan_id, next.plan(), next.completion())
                    .await?;
            }
        }
        Ok(())
    }
}

/// Store the default plan. If another writer seeded it first, use theirs.
async fn seed_plan(plan_id: PlanId, plans: &dyn PlanRepository) -> Result<Plan, TimelineError> {
    let plan = Plan::default_thesis();
    match plans.save_plan(plan_id, &plan).await {
        Ok(()) => {
            info!(plan = %plan_id, "seeded default thesis plan");
            Ok(plan)
        }
        Err(StorageError::Conflict { .. }) => plans
            .get_plan(plan_id)
            .await?
            .ok_or(TimelineError::MissingPlan(plan_id)),
        Err(err) => Err(err.into()),
    }
}

async fn load_state(
    plan_id: PlanId,
    plan: Plan,
    completion: &dyn CompletionRepository,
) -> Result<TimelineState, TimelineError> {
    let cells = completion.load_completion(plan_id).await?;
    let mut state = TimelineState::new(plan, cells);
    let dropped = state.prune_completion();
    if dropped > 0 {
        warn!(plan = %plan_id, dropped, "dropping completed cells outside the plan");
        completion
            .replace_completion(plan_id, state.completion())
            .await?;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storage::repository::{InMemoryRepository, Storage};
    use thesis_core::model::{ActivityDraft, TaskId};

    fn key(a: u64, w: u8, d: u8) -> CellKey {
        CellKey::new(ActivityId::new(a), w, d)
    }

    async fn open_in_memory() -> (TimelineStore, Storage) {
        let storage = Storage::in_memory();
        let store = TimelineStore::open(
            PlanId::new(1),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.completion),
        )
        .await
        .unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn open_seeds_default_plan() {
        let (store, storage) = open_in_memory().await;
        let stored = storage.plans.get_plan(PlanId::new(1)).await.unwrap();
        assert_eq!(stored, Some(Plan::default_thesis()));
        assert_eq!(store.summary().await.completed, 0);
    }

    #[tokio::test]
    async fn toggle_persists_cell() {
        let (store, storage) = open_in_memory().await;
        assert!(store.toggle(key(1, 0, 0)).await.unwrap());
        let stored = storage
            .completion
            .load_completion(PlanId::new(1))
            .await
            .unwrap();
        assert!(stored.contains(&key(1, 0, 0)));

        assert!(!store.toggle(key(1, 0, 0)).await.unwrap());
        let stored = storage
            .completion
            .load_completion(PlanId::new(1))
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn plan_edit_prunes_stored_cells() {
        let (store, storage) = open_in_memory().await;
        store.toggle(key(1, 0, 0)).await.unwrap();
        store.toggle(key(2, 0, 2)).await.unwrap();

        store
            .dispatch(TimelineAction::RemoveTask(TaskId::new(1)))
            .await
            .unwrap();

        let stored = storage
            .completion
            .load_completion(PlanId::new(1))
            .await
            .unwrap();
        assert!(stored.is_empty());
        let plan = storage.plans.get_plan(PlanId::new(1)).await.unwrap().unwrap();
        assert!(plan.task(TaskId::new(1)).is_none());
        assert_eq!(plan.version(), 1);
    }

    #[tokio::test]
    async fn open_drops_stale_cells() {
        let storage = Storage::in_memory();
        storage
            .plans
            .save_plan(PlanId::new(1), &Plan::default_thesis())
            .await
            .unwrap();
        let stale: CompletionSet = [key(1, 0, 0), key(1, 0, 6), key(404, 0, 0)]
            .into_iter()
            .collect();
        storage
            .completion
            .replace_completion(PlanId::new(1), &stale)
            .await
            .unwrap();

        let store = TimelineStore::open(
            PlanId::new(1),
            Arc::clone(&storage.plans),
            Arc::clone(&storage.completion),
        )
        .await
        .unwrap();

        assert_eq!(store.snapshot().await.completion().len(), 1);
        let stored = storage
            .completion
            .load_completion(PlanId::new(1))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn completion_json_round_trip() {
        let (store, _storage) = open_in_memory().await;
        let outcome = store
            .import_completion_json(r#"{"2-0-2": true, "2-0-3": true, "2-0-0": true, "1-0-1": false}"#)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::CompletionReplaced {
                cells: 2,
                dropped: 1
            }
        );
        let exported = store.export_completion_json().await;
        let back = CompletionSet::from_json_str(&exported).unwrap();
        assert!(back.contains(&key(2, 0, 2)));
        assert!(back.contains(&key(2, 0, 3)));
        assert_eq!(back.len(), 2);
    }

    #[tokio::test]
    async fn malformed_import_is_rejected() {
        let (store, _storage) = open_in_memory().await;
        let err = store
            .import_completion_json(r#"{"2-0": true}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, TimelineError::Completion(_)));
    }

    #[tokio::test]
    async fn reload_picks_up_external_edits() {
        let (store, storage) = open_in_memory().await;
        let mut plan = Plan::default_thesis();
        plan.add_activity_draft(TaskId::new(5), ActivityDraft::new("Slides", vec![12], 0, 4))
            .unwrap();
        storage.plans.save_plan(PlanId::new(1), &plan).await.unwrap();

        store.reload().await.unwrap();
        assert_eq!(store.snapshot().await.plan(), &plan);

        storage.plans.delete_plan(PlanId::new(1)).await.unwrap();
        assert!(matches!(
            store.reload().await.unwrap_err(),
            TimelineError::MissingPlan(_)
        ));
    }

    #[tokio::test]
    async fn export_plan_json_contains_tasks() {
        let (store, _storage) = open_in_memory().await;
        let json = store.export_plan_json().await.unwrap();
        let doc = PlanDocument::from_json(&json).unwrap();
        assert_eq!(doc.tasks.len(), 5);
    }

    /// Completion repository whose writes always fail.
    struct FailingCompletion(InMemoryRepository);

    #[async_trait]
    impl CompletionRepository for FailingCompletion {
        async fn load_completion(&self, plan: PlanId) -> Result<CompletionSet, StorageError> {
            self.0.load_completion(plan).await
        }

        async fn set_cell(
            &self,
            _plan: PlanId,
            _key: CellKey,
            _done: bool,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk full".into()))
        }

        async fn replace_completion(
            &self,
            _plan: PlanId,
            _completion: &CompletionSet,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk full".into()))
        }
    }

    #[tokio::test]
    async fn failed_write_keeps_live_state() {
        let repo = InMemoryRepository::new();
        let store = TimelineStore::open(
            PlanId::new(1),
            Arc::new(repo.clone()),
            Arc::new(FailingCompletion(repo)),
        )
        .await
        .unwrap();

        let err = store.toggle(key(1, 0, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            TimelineError::Storage(StorageError::Connection(_))
        ));
        assert!(store.snapshot().await.completion().is_empty());
        assert!((store.activity_progress(ActivityId::new(1)).await.unwrap()).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stale_plan_write_is_reported() {
        let (store, storage) = open_in_memory().await;
        let mut newer = Plan::default_thesis();
        newer.rename_task(TaskId::new(1), "Start").unwrap();
        newer.rename_task(TaskId::new(1), "Start again").unwrap();
        storage.plans.save_plan(PlanId::new(1), &newer).await.unwrap();

        let err = store
            .dispatch(TimelineAction::AddTask {
                name: "Extra".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TimelineError::Storage(StorageError::Conflict { stored: 2, attempted: 1 })
        ));
        assert_eq!(store.snapshot().await.plan().tasks().len(), 5);
    }

    #[tokio::test]
    async fn second_store_from_same_version_conflicts() {
        let storage = Storage::in_memory();
        let open = || {
            TimelineStore::open(
                PlanId::new(1),
                Arc::clone(&storage.plans),
                Arc::clone(&storage.completion),
            )
        };
        let first = open().await.unwrap();
        let second = open().await.unwrap();

        first
            .dispatch(TimelineAction::AddTask {
                name: "From first".into(),
            })
            .await
            .unwrap();
        let err = second
            .dispatch(TimelineAction::AddTask {
                name: "From second".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TimelineError::Storage(StorageError::Conflict { stored: 1, attempted: 1 })
        ));

        let stored = storage.plans.get_plan(PlanId::new(1)).await.unwrap().unwrap();
        let names: Vec<&str> = stored.tasks().iter().map(|t| t.name()).collect();
        assert!(names.contains(&"From first"));
        assert!(!names.contains(&"From second"));
        assert_eq!(second.snapshot().await.plan().tasks().len(), 5);
    }

    /// Completion repository that stores single cells but cannot replace the set.
    struct NoBulkCompletion(InMemoryRepository);

    #[async_trait]
    impl CompletionRepository for NoBulkCompletion {
        async fn load_completion(&self, plan: PlanId) -> Result<CompletionSet, StorageError> {
            self.0.load_completion(plan).await
        }

        async fn set_cell(&self, plan: PlanId, key: CellKey, done: bool) -> Result<(), StorageError> {
            self.0.set_cell(plan, key, done).await
        }

        async fn replace_completion(
            &self,
            _plan: PlanId,
            _completion: &CompletionSet,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk full".into()))
        }
    }

    #[tokio::test]
    async fn plan_edit_stores_plan_and_cells_together() {
        let repo = InMemoryRepository::new();
        let store = TimelineStore::open(
            PlanId::new(1),
            Arc::new(repo.clone()),
            Arc::new(NoBulkCompletion(repo.clone())),
        )
        .await
        .unwrap();
        store.toggle(key(1, 0, 0)).await.unwrap();

        store
            .dispatch(TimelineAction::RemoveTask(TaskId::new(1)))
            .await
            .unwrap();

        let plan = repo.get_plan(PlanId::new(1)).await.unwrap().unwrap();
        assert_eq!(plan.version(), 1);
        assert!(plan.task(TaskId::new(1)).is_none());
        assert!(repo.load_completion(PlanId::new(1)).await.unwrap().is_empty());
        assert!(store.snapshot().await.completion().is_empty());
    }

    /// Plan repository that reads fine but rejects every write.
    struct ReadOnlyPlans(InMemoryRepository);

    #[async_trait]
    impl PlanRepository for ReadOnlyPlans {
        async fn save_plan(&self, _id: PlanId, _plan: &Plan) -> Result<(), StorageError> {
            Err(StorageError::Connection("read-only".into()))
        }

        async fn save_plan_with_completion(
            &self,
            _id: PlanId,
            _plan: &Plan,
            _completion: &CompletionSet,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("read-only".into()))
        }

        async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StorageError> {
            self.0.get_plan(id).await
        }

        async fn list_plans(&self, limit: u32) -> Result<Vec<PlanId>, StorageError> {
            self.0.list_plans(limit).await
        }

        async fn delete_plan(&self, id: PlanId) -> Result<(), StorageError> {
            self.0.delete_plan(id).await
        }
    }

    #[tokio::test]
    async fn failed_plan_edit_leaves_storage_untouched() {
        let repo = InMemoryRepository::new();
        repo.save_plan(PlanId::new(1), &Plan::default_thesis())
            .await
            .unwrap();
        let store = TimelineStore::open(
            PlanId::new(1),
            Arc::new(ReadOnlyPlans(repo.clone())),
            Arc::new(repo.clone()),
        )
        .await
        .unwrap();
        store.toggle(key(1, 0, 0)).await.unwrap();

        let err = store
            .dispatch(TimelineAction::RemoveTask(TaskId::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TimelineError::Storage(StorageError::Connection(_))
        ));

        let plan = repo.get_plan(PlanId::new(1)).await.unwrap().unwrap();
        assert_eq!(plan, Plan::default_thesis());
        assert!(repo
            .load_completion(PlanId::new(1))
            .await
            .unwrap()
            .contains(&key(1, 0, 0)));
        let live = store.snapshot().await;
        assert!(live.plan().task(TaskId::new(1)).is_some());
        assert!(live.is_done(&key(1, 0, 0)));
    }
}
