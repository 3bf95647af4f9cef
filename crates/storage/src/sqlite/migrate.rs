use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        premium INTEGER NOT NULL DEFAULT 0 CHECK (premium IN (0, 1))
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS course_tags (
        course_id INTEGER NOT NULL,
        position INTEGER NOT NULL CHECK (position >= 0),
        tag TEXT NOT NULL,
        PRIMARY KEY (course_id, position),
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS modules (
        id INTEGER PRIMARY KEY,
        course_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        sort_order INTEGER NOT NULL CHECK (sort_order >= 1),
        UNIQUE (course_id, sort_order),
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY,
        module_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        sort_order INTEGER NOT NULL CHECK (sort_order >= 1),
        kind TEXT NOT NULL CHECK (kind IN ('video', 'text', 'quiz')),
        UNIQUE (module_id, sort_order),
        FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_progress (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        course_id INTEGER NOT NULL,
        module_id INTEGER NOT NULL,
        lesson_id INTEGER NOT NULL,
        completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
        progress INTEGER NOT NULL CHECK (progress BETWEEN 0 AND 100),
        created_at TEXT,
        updated_at TEXT,
        UNIQUE (user_id, lesson_id)
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_user_progress_user
        ON user_progress (user_id, updated_at);
    ",
];

/// Applies pending schema migrations.
///
/// Version 1 creates the catalog tables (courses, tags, modules, lessons)
/// and the per-user `user_progress` table.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for &statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
