use std::sync::Arc;

use storage::repository::{PlanRepository, Storage};
use thesis_core::model::PlanId;
use tracing::info;

use crate::Clock;
use crate::error::AppServicesError;
use crate::report_service::ReportService;
use crate::timeline::TimelineStore;

/// Assembles app-facing services and resolves a usable plan id.
#[derive(Clone)]
pub struct AppServices {
    plan_id: PlanId,
    seeded: bool,
    timeline: Arc<TimelineStore>,
    reports: Arc<ReportService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or plan setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        preferred_plan_id: PlanId,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, preferred_plan_id).await
    }

    /// Build services over throwaway in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if plan setup fails.
    pub async fn in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), clock, PlanId::new(1)).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if the plan cannot be resolved or loaded.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        preferred_plan_id: PlanId,
    ) -> Result<Self, AppServicesError> {
        let (plan_id, seeded) =
            resolve_plan_id(storage.plans.as_ref(), preferred_plan_id).await?;
        let timeline = Arc::new(
            TimelineStore::open(
                plan_id,
                Arc::clone(&storage.plans),
                Arc::clone(&storage.completion),
            )
            .await?,
        );
        let reports = Arc::new(ReportService::new(clock));

        Ok(Self {
            plan_id,
            seeded,
            timeline,
            reports,
        })
    }

    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// Whether the default plan was created while starting up.
    #[must_use]
    pub fn seeded(&self) -> bool {
        self.seeded
    }

    #[must_use]
    pub fn timeline(&self) -> Arc<TimelineStore> {
        Arc::clone(&self.timeline)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }
}

/// Prefer the requested plan, fall back to the first stored one, and only
/// seed a new plan when storage is empty.
async fn resolve_plan_id(
    plans: &dyn PlanRepository,
    preferred_id: PlanId,
) -> Result<(PlanId, bool), AppServicesError> {
    if plans.get_plan(preferred_id).await?.is_some() {
        return Ok((preferred_id, false));
    }

    let existing = plans.list_plans(128).await?;
    if let Some(first) = existing.first() {
        info!(requested = %preferred_id, using = %first, "requested plan missing, using first stored plan");
        return Ok((*first, false));
    }

    Ok((preferred_id, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use thesis_core::model::Plan;
    use thesis_core::time::fixed_clock;

    #[tokio::test]
    async fn in_memory_seeds_plan_one() {
        let services = AppServices::in_memory(fixed_clock()).await.unwrap();
        assert_eq!(services.plan_id(), PlanId::new(1));
        assert!(services.seeded());
        let snapshot = services.timeline().snapshot().await;
        assert_eq!(snapshot.plan(), &Plan::default_thesis());
    }

    #[tokio::test]
    async fn falls_back_to_first_stored_plan() {
        let storage = Storage::in_memory();
        storage
            .plans
            .save_plan(PlanId::new(7), &Plan::default_thesis())
            .await
            .unwrap();

        let services = AppServices::from_storage(storage, fixed_clock(), PlanId::new(2))
            .await
            .unwrap();
        assert_eq!(services.plan_id(), PlanId::new(7));
        assert!(!services.seeded());
        assert_eq!(services.timeline().plan_id(), PlanId::new(7));
    }
}
