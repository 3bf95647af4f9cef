use learn_core::model::{Course, CourseId, Lesson, LessonId, Module, ModuleId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    course_id_to_i64, lesson_id_to_i64, map_course_row, map_lesson_row, map_module_row,
    module_id_to_i64, ser,
};
use crate::repository::{CatalogRepository, CatalogWriter, StorageError};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn course_tags(&self, course_id: i64) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT tag FROM course_tags
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("tag").map_err(ser))
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let id = course_id_to_i64(id)?;
        let row = sqlx::query("SELECT id, title, premium FROM courses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => {
                let tags = self.course_tags(id).await?;
                map_course_row(&row, tags).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query("SELECT id, title, premium FROM courses ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = self.course_tags(row.try_get("id").map_err(ser)?).await?;
            courses.push(map_course_row(&row, tags)?);
        }
        Ok(courses)
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query("SELECT id, course_id, title, sort_order FROM modules WHERE id = ?1")
            .bind(module_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_module_row).transpose()
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            "SELECT id, module_id, title, sort_order, kind FROM lessons WHERE id = ?1",
        )
        .bind(lesson_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn modules_by_course(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, sort_order
            FROM modules
            WHERE course_id = ?1
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .bind(course_id_to_i64(course_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_module_row).collect()
    }

    async fn lessons_by_module(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, module_id, title, sort_order, kind
            FROM lessons
            WHERE module_id = ?1
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .bind(module_id_to_i64(module_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_lesson_row).collect()
    }
}

#[async_trait::async_trait]
impl CatalogWriter for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let id = course_id_to_i64(course.id())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title, premium)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                premium = excluded.premium
            ",
        )
        .bind(id)
        .bind(course.title())
        .bind(i64::from(course.is_premium()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM course_tags WHERE course_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, tag) in course.tags().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("tag position overflow".into()))?;
            sqlx::query("INSERT INTO course_tags (course_id, position, tag) VALUES (?1, ?2, ?3)")
                .bind(id)
                .bind(position)
                .bind(tag.as_str())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO modules (id, course_id, title, sort_order)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                sort_order = excluded.sort_order
            ",
        )
        .bind(module_id_to_i64(module.id())?)
        .bind(course_id_to_i64(module.course_id())?)
        .bind(module.title())
        .bind(i64::from(module.order()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lessons (id, module_id, title, sort_order, kind)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                module_id = excluded.module_id,
                title = excluded.title,
                sort_order = excluded.sort_order,
                kind = excluded.kind
            ",
        )
        .bind(lesson_id_to_i64(lesson.id())?)
        .bind(module_id_to_i64(lesson.module_id())?)
        .bind(lesson.title())
        .bind(i64::from(lesson.order()))
        .bind(lesson.kind().as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
