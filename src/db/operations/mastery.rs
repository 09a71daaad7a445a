use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::db::{CalibrationStore, StoreError};
use crate::types::{now_ms, MasteryRecord, MAX_STAGE};

/// Partial mastery update; unset fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasteryPatch {
    pub stage: Option<u8>,
    pub stability: Option<f64>,
    pub difficulty: Option<f64>,
    pub exposure_count: Option<u32>,
    pub cue_free_accuracy: Option<f64>,
    pub cue_assisted_accuracy: Option<f64>,
    pub lapses: Option<u32>,
    pub last_review: Option<i64>,
    pub next_review: Option<i64>,
}

impl MasteryPatch {
    pub fn apply(&self, record: &mut MasteryRecord) {
        if let Some(stage) = self.stage {
            record.stage = stage.min(MAX_STAGE);
        }
        if let Some(v) = self.stability {
            record.stability = v;
        }
        if let Some(v) = self.difficulty {
            record.difficulty = v;
        }
        if let Some(v) = self.exposure_count {
            record.exposure_count = v;
        }
        if let Some(v) = self.cue_free_accuracy {
            record.cue_free_accuracy = v.clamp(0.0, 1.0);
        }
        if let Some(v) = self.cue_assisted_accuracy {
            record.cue_assisted_accuracy = v.clamp(0.0, 1.0);
        }
        if let Some(v) = self.lapses {
            record.lapses = v;
        }
        if self.last_review.is_some() {
            record.last_review = self.last_review;
        }
        if self.next_review.is_some() {
            record.next_review = self.next_review;
        }
    }
}

impl From<&MasteryRecord> for MasteryPatch {
    fn from(record: &MasteryRecord) -> Self {
        Self {
            stage: Some(record.stage),
            stability: Some(record.stability),
            difficulty: Some(record.difficulty),
            exposure_count: Some(record.exposure_count),
            cue_free_accuracy: Some(record.cue_free_accuracy),
            cue_assisted_accuracy: Some(record.cue_assisted_accuracy),
            lapses: Some(record.lapses),
            last_review: record.last_review,
            next_review: record.next_review,
        }
    }
}

pub async fn fetch_mastery(
    conn: &mut SqliteConnection,
    learner_id: &str,
    object_id: &str,
) -> Result<Option<MasteryRecord>, StoreError> {
    let row = sqlx::query(
        r#"SELECT * FROM "mastery_records" WHERE "learnerId" = ? AND "objectId" = ?"#,
    )
    .bind(learner_id)
    .bind(object_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(map_mastery).transpose()
}

/// Every stored record of one learner, keyed by object id.
pub async fn fetch_mastery_for_learner(
    conn: &mut SqliteConnection,
    learner_id: &str,
) -> Result<HashMap<String, MasteryRecord>, StoreError> {
    let rows = sqlx::query(r#"SELECT * FROM "mastery_records" WHERE "learnerId" = ?"#)
        .bind(learner_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|row| {
            let object_id: String = row.try_get("objectId")?;
            Ok::<_, StoreError>((object_id, map_mastery(row)?))
        })
        .collect()
}

/// Applies `patch` over the stored record (or a fresh one) and returns the result.
pub async fn upsert_mastery(
    conn: &mut SqliteConnection,
    learner_id: &str,
    object_id: &str,
    patch: &MasteryPatch,
) -> Result<MasteryRecord, StoreError> {
    let mut record = fetch_mastery(conn, learner_id, object_id)
        .await?
        .unwrap_or_default();
    patch.apply(&mut record);

    sqlx::query(
        r#"
        INSERT INTO "mastery_records" (
            "learnerId", "objectId", "stage", "stability", "difficulty", "exposureCount",
            "cueFreeAccuracy", "cueAssistedAccuracy", "lapses", "lastReview", "nextReview",
            "updatedAt"
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("learnerId", "objectId") DO UPDATE SET
            "stage" = excluded."stage",
            "stability" = excluded."stability",
            "difficulty" = excluded."difficulty",
            "exposureCount" = excluded."exposureCount",
            "cueFreeAccuracy" = excluded."cueFreeAccuracy",
            "cueAssistedAccuracy" = excluded."cueAssistedAccuracy",
            "lapses" = excluded."lapses",
            "lastReview" = excluded."lastReview",
            "nextReview" = excluded."nextReview",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(learner_id)
    .bind(object_id)
    .bind(i64::from(record.stage))
    .bind(record.stability)
    .bind(record.difficulty)
    .bind(i64::from(record.exposure_count))
    .bind(record.cue_free_accuracy)
    .bind(record.cue_assisted_accuracy)
    .bind(i64::from(record.lapses))
    .bind(record.last_review)
    .bind(record.next_review)
    .bind(now_ms())
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

fn map_mastery(row: &SqliteRow) -> Result<MasteryRecord, StoreError> {
    let stage: i64 = row.try_get("stage")?;
    let exposure_count: i64 = row.try_get("exposureCount")?;
    let lapses: i64 = row.try_get("lapses")?;
    Ok(MasteryRecord {
        stage: stage.clamp(0, i64::from(MAX_STAGE)) as u8,
        stability: row.try_get("stability")?,
        difficulty: row.try_get("difficulty")?,
        exposure_count: exposure_count.clamp(0, i64::from(u32::MAX)) as u32,
        cue_free_accuracy: row.try_get("cueFreeAccuracy")?,
        cue_assisted_accuracy: row.try_get("cueAssistedAccuracy")?,
        lapses: lapses.clamp(0, i64::from(u32::MAX)) as u32,
        last_review: row.try_get("lastReview")?,
        next_review: row.try_get("nextReview")?,
    })
}

impl CalibrationStore {
    pub async fn fetch_mastery(
        &self,
        learner_id: &str,
        object_id: &str,
    ) -> Result<Option<MasteryRecord>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_mastery(&mut conn, learner_id, object_id).await
    }

    pub async fn fetch_mastery_for_learner(
        &self,
        learner_id: &str,
    ) -> Result<HashMap<String, MasteryRecord>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_mastery_for_learner(&mut conn, learner_id).await
    }

    pub async fn upsert_mastery(
        &self,
        learner_id: &str,
        object_id: &str,
        patch: &MasteryPatch,
    ) -> Result<MasteryRecord, StoreError> {
        let mut tx = self.pool().begin().await?;
        let record = upsert_mastery(&mut tx, learner_id, object_id, patch).await?;
        tx.commit().await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut record = MasteryRecord {
            stage: 2,
            exposure_count: 7,
            ..Default::default()
        };
        MasteryPatch {
            stage: Some(9),
            cue_free_accuracy: Some(1.4),
            ..Default::default()
        }
        .apply(&mut record);
        assert_eq!(record.stage, MAX_STAGE);
        assert_eq!(record.exposure_count, 7);
        assert_eq!(record.cue_free_accuracy, 1.0);
    }
}
