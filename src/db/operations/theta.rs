use sqlx::{Row, SqliteConnection};

use crate::db::{CalibrationStore, StoreError};
use crate::types::{now_ms, UserThetaProfile};

pub async fn fetch_theta_profile(
    conn: &mut SqliteConnection,
    learner_id: &str,
) -> Result<Option<UserThetaProfile>, StoreError> {
    let row = sqlx::query(r#"SELECT * FROM "theta_profiles" WHERE "learnerId" = ?"#)
        .bind(learner_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(UserThetaProfile {
        phon: row.try_get("phon")?,
        morph: row.try_get("morph")?,
        lex: row.try_get("lex")?,
        synt: row.try_get("synt")?,
        prag: row.try_get("prag")?,
        global: row.try_get("global")?,
    }))
}

pub async fn upsert_theta_profile(
    conn: &mut SqliteConnection,
    learner_id: &str,
    profile: &UserThetaProfile,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "theta_profiles"
            ("learnerId", "phon", "morph", "lex", "synt", "prag", "global", "updatedAt")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("learnerId") DO UPDATE SET
            "phon" = excluded."phon",
            "morph" = excluded."morph",
            "lex" = excluded."lex",
            "synt" = excluded."synt",
            "prag" = excluded."prag",
            "global" = excluded."global",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(learner_id)
    .bind(profile.phon)
    .bind(profile.morph)
    .bind(profile.lex)
    .bind(profile.synt)
    .bind(profile.prag)
    .bind(profile.global)
    .bind(now_ms())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl CalibrationStore {
    pub async fn fetch_theta_profile(
        &self,
        learner_id: &str,
    ) -> Result<Option<UserThetaProfile>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_theta_profile(&mut conn, learner_id).await
    }

    pub async fn upsert_theta_profile(
        &self,
        learner_id: &str,
        profile: &UserThetaProfile,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await?;
        upsert_theta_profile(&mut conn, learner_id, profile).await
    }
}
