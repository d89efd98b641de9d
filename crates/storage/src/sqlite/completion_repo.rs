use async_trait::async_trait;
use sqlx::SqliteConnection;
use thesis_core::model::{CellKey, CompletionSet, PlanId};

use super::SqliteRepository;
use super::mapping::{conn, map_cell_row, map_write_error, plan_id_to_i64, u64_to_i64};
use crate::repository::{CompletionRepository, StorageError};

#[async_trait]
impl CompletionRepository for SqliteRepository {
    async fn load_completion(&self, plan: PlanId) -> Result<CompletionSet, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT activity_id, week, day
            FROM completed_cells
            WHERE plan_id = ?1
            ",
        )
        .bind(plan_id_to_i64(plan)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_cell_row).collect()
    }

    async fn set_cell(&self, plan: PlanId, key: CellKey, done: bool) -> Result<(), StorageError> {
        let plan_id = plan_id_to_i64(plan)?;
        let activity_id = u64_to_i64("activity_id", key.activity().value())?;

        if done {
            sqlx::query(
                r"
                INSERT INTO completed_cells (plan_id, activity_id, week, day)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(plan_id, activity_id, week, day) DO NOTHING
                ",
            )
            .bind(plan_id)
            .bind(activity_id)
            .bind(i64::from(key.week()))
            .bind(i64::from(key.day()))
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM plans WHERE id = ?1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            DELETE FROM completed_cells
            WHERE plan_id = ?1 AND activity_id = ?2 AND week = ?3 AND day = ?4
            ",
        )
        .bind(plan_id)
        .bind(activity_id)
        .bind(i64::from(key.week()))
        .bind(i64::from(key.day()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn replace_completion(
        &self,
        plan: PlanId,
        completion: &CompletionSet,
    ) -> Result<(), StorageError> {
        let plan_id = plan_id_to_i64(plan)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM plans WHERE id = ?1")
            .bind(plan_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        replace_cells(&mut *tx, plan_id, completion).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

/// Swap the stored cells of a plan inside the caller's transaction.
pub(super) async fn replace_cells(
    tx: &mut SqliteConnection,
    plan_id: i64,
    completion: &CompletionSet,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM completed_cells WHERE plan_id = ?1")
        .bind(plan_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

    for key in completion.iter() {
        sqlx::query(
            r"
            INSERT INTO completed_cells (plan_id, activity_id, week, day)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(plan_id)
        .bind(u64_to_i64("activity_id", key.activity().value())?)
        .bind(i64::from(key.week()))
        .bind(i64::from(key.day()))
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
    }
    Ok(())
}
