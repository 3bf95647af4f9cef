use learn_core::model::{ProgressId, ProgressRecord, UserId};

use super::SqliteRepository;
use super::mapping::{
    course_id_to_i64, lesson_id_to_i64, map_progress_row, module_id_to_i64, progress_id_from_i64,
    progress_id_to_i64, user_id_to_i64,
};
use crate::repository::{ProgressRepository, StorageError};

const SELECT_PROGRESS: &str = r"
    SELECT id, user_id, course_id, module_id, lesson_id, completed, progress, created_at, updated_at
    FROM user_progress
";

fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

impl SqliteRepository {
    async fn progress_by_id(&self, id: ProgressId) -> Result<ProgressRecord, StorageError> {
        let row = sqlx::query(&format!("{SELECT_PROGRESS} WHERE id = ?1"))
            .bind(progress_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;
        map_progress_row(&row)
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(&format!("{SELECT_PROGRESS} WHERE user_id = ?1 ORDER BY id ASC"))
            .bind(user_id_to_i64(user_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, StorageError> {
        let progress = i64::from(record.progress().value());
        let completed = i64::from(record.is_completed());

        let id = match record.id() {
            Some(id) => {
                // created_at stays as first written
                let res = sqlx::query(
                    r"
                    UPDATE user_progress
                    SET completed = ?1, progress = ?2, updated_at = ?3
                    WHERE id = ?4 AND user_id = ?5 AND lesson_id = ?6
                    ",
                )
                .bind(completed)
                .bind(progress)
                .bind(record.updated_at())
                .bind(progress_id_to_i64(id)?)
                .bind(user_id_to_i64(record.user_id())?)
                .bind(lesson_id_to_i64(record.lesson_id())?)
                .execute(&self.pool)
                .await
                .map_err(write_err)?;

                if res.rows_affected() == 0 {
                    return Err(StorageError::NotFound);
                }
                id
            }
            None => {
                let res = sqlx::query(
                    r"
                    INSERT INTO user_progress (
                        user_id, course_id, module_id, lesson_id,
                        completed, progress, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ",
                )
                .bind(user_id_to_i64(record.user_id())?)
                .bind(course_id_to_i64(record.course_id())?)
                .bind(module_id_to_i64(record.module_id())?)
                .bind(lesson_id_to_i64(record.lesson_id())?)
                .bind(completed)
                .bind(progress)
                .bind(record.created_at())
                .bind(record.updated_at())
                .execute(&self.pool)
                .await
                .map_err(write_err)?;

                progress_id_from_i64(res.last_insert_rowid())?
            }
        };

        self.progress_by_id(id).await
    }
}
