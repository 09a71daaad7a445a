pub const SCHEMA_VERSION: &str = "1";

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "_db_metadata" (
    "key" TEXT PRIMARY KEY,
    "value" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "language_objects" (
    "id" TEXT PRIMARY KEY,
    "componentType" TEXT NOT NULL,
    "content" TEXT NOT NULL,
    "irtDifficulty" REAL NOT NULL DEFAULT 0,
    "irtDiscrimination" REAL NOT NULL DEFAULT 1,
    "priority" REAL NOT NULL DEFAULT 0.5,
    "frequency" REAL NOT NULL DEFAULT 0.5,
    "relationalDensity" REAL NOT NULL DEFAULT 0.5,
    "contextualContribution" REAL NOT NULL DEFAULT 0.5,
    "properties" TEXT NOT NULL DEFAULT '{}',
    "createdAt" INTEGER NOT NULL,
    "updatedAt" INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS "goal_objects" (
    "goalId" TEXT NOT NULL,
    "objectId" TEXT NOT NULL REFERENCES "language_objects" ("id") ON DELETE CASCADE,
    "position" INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY ("goalId", "objectId")
);

CREATE INDEX IF NOT EXISTS "idx_goal_objects_goal" ON "goal_objects" ("goalId", "position");

CREATE TABLE IF NOT EXISTS "collocations" (
    "goalId" TEXT NOT NULL,
    "objectA" TEXT NOT NULL,
    "objectB" TEXT NOT NULL,
    "strength" REAL NOT NULL,
    PRIMARY KEY ("goalId", "objectA", "objectB")
);

CREATE TABLE IF NOT EXISTS "mastery_records" (
    "learnerId" TEXT NOT NULL,
    "objectId" TEXT NOT NULL,
    "stage" INTEGER NOT NULL DEFAULT 0,
    "stability" REAL NOT NULL DEFAULT 0,
    "difficulty" REAL NOT NULL DEFAULT 0.3,
    "exposureCount" INTEGER NOT NULL DEFAULT 0,
    "cueFreeAccuracy" REAL NOT NULL DEFAULT 0,
    "cueAssistedAccuracy" REAL NOT NULL DEFAULT 0,
    "lapses" INTEGER NOT NULL DEFAULT 0,
    "lastReview" INTEGER,
    "nextReview" INTEGER,
    "updatedAt" INTEGER NOT NULL,
    PRIMARY KEY ("learnerId", "objectId")
);

CREATE TABLE IF NOT EXISTS "usage_spaces" (
    "learnerId" TEXT NOT NULL,
    "objectId" TEXT NOT NULL,
    "space" TEXT NOT NULL,
    "coverageRatio" REAL NOT NULL,
    "updatedAt" INTEGER NOT NULL,
    PRIMARY KEY ("learnerId", "objectId")
);

CREATE TABLE IF NOT EXISTS "theta_profiles" (
    "learnerId" TEXT PRIMARY KEY,
    "phon" REAL NOT NULL DEFAULT 0,
    "morph" REAL NOT NULL DEFAULT 0,
    "lex" REAL NOT NULL DEFAULT 0,
    "synt" REAL NOT NULL DEFAULT 0,
    "prag" REAL NOT NULL DEFAULT 0,
    "global" REAL NOT NULL DEFAULT 0,
    "updatedAt" INTEGER NOT NULL
);
"#;

/// Splits on `;` outside quoted identifiers and literals.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        let stmts = split_sql_statements(r#"SELECT ';' AS "a;b"; SELECT 2;"#);
        assert_eq!(stmts, vec![r#"SELECT ';' AS "a;b""#, "SELECT 2"]);
    }

    #[test]
    fn test_schema_has_every_table() {
        let stmts = split_sql_statements(SCHEMA_SQL);
        for table in [
            "_db_metadata",
            "language_objects",
            "goal_objects",
            "collocations",
            "mastery_records",
            "usage_spaces",
            "theta_profiles",
        ] {
            let needle = format!(r#"CREATE TABLE IF NOT EXISTS "{table}""#);
            assert!(stmts.iter().any(|s| s.starts_with(&needle)), "{table}");
        }
    }
}
