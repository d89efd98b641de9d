use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use thesis_core::model::{CompletionSet, Plan, PlanId};

use super::SqliteRepository;
use super::completion_repo::replace_cells;
use super::mapping::{conn, map_plan_row, plan_id_from_i64, plan_id_to_i64, ser, u64_to_i64};
use crate::document::PlanDocument;
use crate::repository::{PlanRepository, StorageError};

/// Version check and upsert of one plan row inside the caller's transaction.
async fn write_plan(
    tx: &mut SqliteConnection,
    id: PlanId,
    plan: &Plan,
) -> Result<i64, StorageError> {
    let id = plan_id_to_i64(id)?;
    let version = u64_to_i64("version", plan.version())?;
    let document = PlanDocument::from_plan(plan).to_json().map_err(ser)?;

    let stored: Option<i64> = sqlx::query("SELECT version FROM plans WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        .map(|row| row.try_get::<i64, _>("version"))
        .transpose()
        .map_err(ser)?;
    if let Some(stored) = stored {
        if stored >= version {
            return Err(StorageError::Conflict {
                stored: u64::try_from(stored).unwrap_or_default(),
                attempted: plan.version(),
            });
        }
    }

    sqlx::query(
        r"
        INSERT INTO plans (id, version, document, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            version = excluded.version,
            document = excluded.document,
            updated_at = excluded.updated_at
        ",
    )
    .bind(id)
    .bind(version)
    .bind(document)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(conn)?;

    Ok(id)
}

#[async_trait]
impl PlanRepository for SqliteRepository {
    async fn save_plan(&self, id: PlanId, plan: &Plan) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        write_plan(&mut *tx, id, plan).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn save_plan_with_completion(
        &self,
        id: PlanId,
        plan: &Plan,
        completion: &CompletionSet,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let plan_id = write_plan(&mut *tx, id, plan).await?;
        replace_cells(&mut *tx, plan_id, completion).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>, StorageError> {
        let row = sqlx::query("SELECT version, document FROM plans WHERE id = ?1")
            .bind(plan_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_plan_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_plans(&self, limit: u32) -> Result<Vec<PlanId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM plans ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| plan_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?))
            .collect()
    }

    async fn delete_plan(&self, id: PlanId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM plans WHERE id = ?1")
            .bind(plan_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
