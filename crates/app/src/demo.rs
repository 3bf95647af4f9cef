//! Demo catalog written by `learn seed`.

use anyhow::Result;
use learn_core::model::{Course, CourseId, Lesson, LessonId, LessonKind, Module, ModuleId};
use storage::repository::CatalogWriter;

pub const DEMO_COURSE: CourseId = CourseId::new(1);

const MODULES: &[(u64, u32, &str, &[(u64, u32, &str, LessonKind)])] = &[
    (
        1,
        1,
        "Getting started",
        &[
            (1, 1, "Installing the toolchain", LessonKind::Video),
            (2, 2, "Cargo basics", LessonKind::Text),
            (3, 3, "Checkpoint", LessonKind::Quiz),
        ],
    ),
    (
        2,
        2,
        "Ownership",
        &[
            (4, 1, "Moves and copies", LessonKind::Video),
            (5, 2, "Borrowing", LessonKind::Text),
            (6, 3, "Checkpoint", LessonKind::Quiz),
        ],
    ),
];

/// Upsert the demo course, returning how many lessons were written.
pub async fn seed(writer: &dyn CatalogWriter) -> Result<usize> {
    let course = Course::new(
        DEMO_COURSE,
        "Rust Foundations",
        vec!["rust".into(), "beginner".into()],
        false,
    )?;
    writer.upsert_course(&course).await?;

    let mut lessons_written = 0;
    for &(module_id, module_order, title, lessons) in MODULES {
        let module = Module::new(ModuleId::new(module_id), DEMO_COURSE, title, module_order)?;
        writer.upsert_module(&module).await?;
        for &(lesson_id, lesson_order, lesson_title, kind) in lessons {
            let lesson = Lesson::new(
                LessonId::new(lesson_id),
                module.id(),
                lesson_title,
                lesson_order,
                kind,
            )?;
            writer.upsert_lesson(&lesson).await?;
            lessons_written += 1;
        }
    }
    Ok(lessons_written)
}
