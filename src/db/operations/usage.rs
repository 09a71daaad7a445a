use sqlx::SqliteConnection;

use crate::db::{CalibrationStore, StoreError};
use crate::types::now_ms;
use crate::usage::ObjectUsageSpace;

/// Usage spaces are stored whole as JSON, keyed by learner and object.
pub async fn load_usage_space(
    conn: &mut SqliteConnection,
    learner_id: &str,
    object_id: &str,
) -> Result<Option<ObjectUsageSpace>, StoreError> {
    let raw: Option<String> = sqlx::query_scalar(
        r#"SELECT "space" FROM "usage_spaces" WHERE "learnerId" = ? AND "objectId" = ?"#,
    )
    .bind(learner_id)
    .bind(object_id)
    .fetch_optional(&mut *conn)
    .await?;

    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub async fn load_usage_spaces_for_learner(
    conn: &mut SqliteConnection,
    learner_id: &str,
) -> Result<Vec<ObjectUsageSpace>, StoreError> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"SELECT "space" FROM "usage_spaces" WHERE "learnerId" = ? ORDER BY "objectId""#,
    )
    .bind(learner_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|json| serde_json::from_str(json).map_err(StoreError::from))
        .collect()
}

pub async fn save_usage_space(
    conn: &mut SqliteConnection,
    learner_id: &str,
    space: &ObjectUsageSpace,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(space)?;
    sqlx::query(
        r#"
        INSERT INTO "usage_spaces" ("learnerId", "objectId", "space", "coverageRatio", "updatedAt")
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT ("learnerId", "objectId") DO UPDATE SET
            "space" = excluded."space",
            "coverageRatio" = excluded."coverageRatio",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(learner_id)
    .bind(&space.object_id)
    .bind(json)
    .bind(space.coverage_ratio)
    .bind(now_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl CalibrationStore {
    pub async fn load_usage_space(
        &self,
        learner_id: &str,
        object_id: &str,
    ) -> Result<Option<ObjectUsageSpace>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        load_usage_space(&mut conn, learner_id, object_id).await
    }

    pub async fn load_usage_spaces_for_learner(
        &self,
        learner_id: &str,
    ) -> Result<Vec<ObjectUsageSpace>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        load_usage_spaces_for_learner(&mut conn, learner_id).await
    }

    pub async fn save_usage_space(
        &self,
        learner_id: &str,
        space: &ObjectUsageSpace,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await?;
        save_usage_space(&mut conn, learner_id, space).await
    }
}
