use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::constraints::Collocation;
use crate::db::{CalibrationStore, StoreError};
use crate::types::{now_ms, ComponentType, LanguageObject, ObjectProperties};

pub async fn insert_object(
    conn: &mut SqliteConnection,
    object: &LanguageObject,
) -> Result<(), StoreError> {
    let properties = serde_json::to_string(&object.properties)?;
    let now = now_ms();
    sqlx::query(
        r#"
        INSERT INTO "language_objects" (
            "id", "componentType", "content", "irtDifficulty", "irtDiscrimination",
            "priority", "frequency", "relationalDensity", "contextualContribution",
            "properties", "createdAt", "updatedAt"
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
            "componentType" = excluded."componentType",
            "content" = excluded."content",
            "irtDifficulty" = excluded."irtDifficulty",
            "irtDiscrimination" = excluded."irtDiscrimination",
            "priority" = excluded."priority",
            "frequency" = excluded."frequency",
            "relationalDensity" = excluded."relationalDensity",
            "contextualContribution" = excluded."contextualContribution",
            "properties" = excluded."properties",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(&object.id)
    .bind(object.component.as_str())
    .bind(&object.content)
    .bind(object.irt_difficulty)
    .bind(object.irt_discrimination)
    .bind(object.priority)
    .bind(object.frequency)
    .bind(object.relational_density)
    .bind(object.contextual_contribution)
    .bind(properties)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_object(
    conn: &mut SqliteConnection,
    object_id: &str,
) -> Result<Option<LanguageObject>, StoreError> {
    let row = sqlx::query(r#"SELECT * FROM "language_objects" WHERE "id" = ?"#)
        .bind(object_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_object).transpose()
}

/// Objects attached to a goal, in attachment order.
pub async fn fetch_objects_for_goal(
    conn: &mut SqliteConnection,
    goal_id: &str,
) -> Result<Vec<LanguageObject>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT o.* FROM "language_objects" o
        JOIN "goal_objects" g ON g."objectId" = o."id"
        WHERE g."goalId" = ?
        ORDER BY g."position" ASC, o."id" ASC
        "#,
    )
    .bind(goal_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_object).collect()
}

pub async fn attach_object_to_goal(
    conn: &mut SqliteConnection,
    goal_id: &str,
    object_id: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO "goal_objects" ("goalId", "objectId", "position")
        VALUES (?, ?, (SELECT COUNT(*) FROM "goal_objects" WHERE "goalId" = ?))
        "#,
    )
    .bind(goal_id)
    .bind(object_id)
    .bind(goal_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_collocation(
    conn: &mut SqliteConnection,
    goal_id: &str,
    collocation: &Collocation,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO "collocations" ("goalId", "objectA", "objectB", "strength")
        VALUES (?, ?, ?, ?)
        ON CONFLICT ("goalId", "objectA", "objectB") DO UPDATE SET
            "strength" = excluded."strength"
        "#,
    )
    .bind(goal_id)
    .bind(&collocation.object_a)
    .bind(&collocation.object_b)
    .bind(collocation.strength)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_collocations(
    conn: &mut SqliteConnection,
    goal_id: &str,
) -> Result<Vec<Collocation>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT "objectA", "objectB", "strength" FROM "collocations"
        WHERE "goalId" = ?
        ORDER BY "objectA", "objectB"
        "#,
    )
    .bind(goal_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok::<_, StoreError>(Collocation {
                object_a: row.try_get("objectA")?,
                object_b: row.try_get("objectB")?,
                strength: row.try_get("strength")?,
            })
        })
        .collect()
}

fn map_object(row: &SqliteRow) -> Result<LanguageObject, StoreError> {
    let component_raw: String = row.try_get("componentType")?;
    let component = ComponentType::parse(&component_raw).ok_or_else(|| StoreError::Corrupt {
        table: "language_objects",
        detail: format!("unknown component type {component_raw}"),
    })?;
    let properties_raw: String = row.try_get("properties")?;
    let properties: ObjectProperties = serde_json::from_str(&properties_raw)?;

    Ok(LanguageObject {
        id: row.try_get("id")?,
        component,
        content: row.try_get("content")?,
        irt_difficulty: row.try_get("irtDifficulty")?,
        irt_discrimination: row.try_get("irtDiscrimination")?,
        priority: row.try_get("priority")?,
        frequency: row.try_get("frequency")?,
        relational_density: row.try_get("relationalDensity")?,
        contextual_contribution: row.try_get("contextualContribution")?,
        properties,
    })
}

impl CalibrationStore {
    pub async fn insert_object(&self, object: &LanguageObject) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await?;
        insert_object(&mut conn, object).await
    }

    pub async fn fetch_object(&self, object_id: &str) -> Result<Option<LanguageObject>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_object(&mut conn, object_id).await
    }

    pub async fn fetch_objects_for_goal(
        &self,
        goal_id: &str,
    ) -> Result<Vec<LanguageObject>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_objects_for_goal(&mut conn, goal_id).await
    }

    pub async fn attach_object_to_goal(
        &self,
        goal_id: &str,
        object_id: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await?;
        attach_object_to_goal(&mut conn, goal_id, object_id).await
    }

    pub async fn insert_collocation(
        &self,
        goal_id: &str,
        collocation: &Collocation,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool().acquire().await?;
        insert_collocation(&mut conn, goal_id, collocation).await
    }

    pub async fn fetch_collocations(&self, goal_id: &str) -> Result<Vec<Collocation>, StoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_collocations(&mut conn, goal_id).await
    }
}
