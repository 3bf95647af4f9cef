use learn_core::model::{
    Course, CourseId, Lesson, LessonId, LessonKind, Module, ModuleId, ProgressId, ProgressPercent,
    ProgressRecord, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn order_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid sort_order: {v}")))
}

pub(crate) fn course_id_to_i64(id: CourseId) -> Result<i64, StorageError> {
    u64_to_i64("course_id", id.value())
}

pub(crate) fn module_id_to_i64(id: ModuleId) -> Result<i64, StorageError> {
    u64_to_i64("module_id", id.value())
}

pub(crate) fn lesson_id_to_i64(id: LessonId) -> Result<i64, StorageError> {
    u64_to_i64("lesson_id", id.value())
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    u64_to_i64("user_id", id.value())
}

pub(crate) fn progress_id_to_i64(id: ProgressId) -> Result<i64, StorageError> {
    u64_to_i64("progress_id", id.value())
}

pub(crate) fn progress_id_from_i64(v: i64) -> Result<ProgressId, StorageError> {
    Ok(ProgressId::new(i64_to_u64("progress_id", v)?))
}

/// Builds a course from its row plus tags already sorted by position.
pub(crate) fn map_course_row(row: &SqliteRow, tags: Vec<String>) -> Result<Course, StorageError> {
    Course::new(
        CourseId::new(i64_to_u64("course_id", row.try_get("id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        tags,
        row.try_get::<i64, _>("premium").map_err(ser)? != 0,
    )
    .map_err(ser)
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    Module::new(
        ModuleId::new(i64_to_u64("module_id", row.try_get("id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        order_from_i64(row.try_get("sort_order").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let kind: LessonKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    Lesson::new(
        LessonId::new(i64_to_u64("lesson_id", row.try_get("id").map_err(ser)?)?),
        ModuleId::new(i64_to_u64("module_id", row.try_get("module_id").map_err(ser)?)?),
        row.try_get::<String, _>("title").map_err(ser)?,
        order_from_i64(row.try_get("sort_order").map_err(ser)?)?,
        kind,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let progress = ProgressPercent::try_from(row.try_get::<i64, _>("progress").map_err(ser)?)
        .map_err(ser)?;
    Ok(ProgressRecord::from_persisted(
        progress_id_from_i64(row.try_get("id").map_err(ser)?)?,
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        ModuleId::new(i64_to_u64("module_id", row.try_get("module_id").map_err(ser)?)?),
        LessonId::new(i64_to_u64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?),
        row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        progress,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
