use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use learn_core::model::{CourseId, Lesson, LessonId, Module, ProgressPercent};
use services::{AppServices, CacheStatus, CourseCompletion, ProgressService, WriteOutcome};

use crate::demo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LessonState {
    Completed,
    Open,
    Locked,
}

impl LessonState {
    fn marker(self) -> &'static str {
        match self {
            Self::Completed => "[x]",
            Self::Open => "[>]",
            Self::Locked => "[ ]",
        }
    }
}

async fn lesson_state(progress: &ProgressService, lesson_id: LessonId) -> LessonState {
    if progress.is_completed(lesson_id) {
        LessonState::Completed
    } else if progress.is_accessible(lesson_id).await {
        LessonState::Open
    } else {
        LessonState::Locked
    }
}

/// Lesson plus its module, or an error naming the missing row.
async fn locate(progress: &ProgressService, lesson_id: LessonId) -> Result<(Module, Lesson)> {
    progress
        .locate_lesson(lesson_id)
        .await?
        .with_context(|| format!("lesson {lesson_id} not found"))
}

fn stale_note(out: &mut String, progress: &ProgressService) {
    if progress.cache_status() == CacheStatus::Stale {
        out.push_str("(progress could not be loaded; showing last known state)\n");
    }
}

pub async fn seed(services: &AppServices) -> Result<String> {
    let lessons = demo::seed(services.catalog_writer().as_ref()).await?;
    services.progress().invalidate_outlines();
    Ok(format!("seeded course {} with {lessons} lessons\n", demo::DEMO_COURSE))
}

pub async fn courses(services: &AppServices) -> Result<String> {
    let progress = services.progress();
    let courses = progress.courses().await?;
    if courses.is_empty() {
        return Ok("no courses yet, run `learn seed`\n".to_string());
    }

    let mut out = String::new();
    for course in courses {
        let completion = progress.course_completion(course.id()).await?;
        let premium = if course.is_premium() { " (premium)" } else { "" };
        writeln!(
            out,
            "{:>4}  {}{premium}  {}/{} lessons, {}%",
            course.id().value(),
            course.title(),
            completion.completed,
            completion.total,
            completion.percent()
        )?;
    }
    stale_note(&mut out, &progress);
    Ok(out)
}

pub async fn show(services: &AppServices, course_id: CourseId) -> Result<String> {
    let progress = services.progress();
    let course = progress
        .course(course_id)
        .await?
        .with_context(|| format!("course {course_id} not found"))?;
    let outline = progress.outline(course_id).await?;
    let completion = CourseCompletion {
        completed: progress.completed_in_course(course_id),
        total: outline.total_lessons(),
    };

    let mut out = String::new();
    writeln!(
        out,
        "{}  [{}/{} lessons, {}%]",
        course.title(),
        completion.completed,
        completion.total,
        completion.percent()
    )?;
    if !course.tags().is_empty() {
        writeln!(out, "tags: {}", course.tags().join(", "))?;
    }

    for entry in outline.modules() {
        let module = entry.module();
        writeln!(out, "  {}. {}", module.order(), module.title())?;
        for lesson in entry.lessons() {
            let state = lesson_state(&progress, lesson.id()).await;
            write!(
                out,
                "     {} {:>3} {} ({})",
                state.marker(),
                lesson.id().value(),
                lesson.title(),
                lesson.kind()
            )?;
            match progress.record(lesson.id()) {
                Some(record) if !record.is_completed() => writeln!(out, " {}", record.progress())?,
                _ => writeln!(out)?,
            }
        }
    }
    stale_note(&mut out, &progress);
    Ok(out)
}

pub async fn complete(services: &AppServices, lesson_id: LessonId) -> Result<String> {
    let progress = services.progress();
    let (module, lesson) = locate(&progress, lesson_id).await?;
    if !progress.is_accessible(lesson_id).await {
        bail!("lesson {lesson_id} ({}) is still locked", lesson.title());
    }
    progress
        .mark_completed(module.course_id(), module.id(), lesson_id)
        .await?;

    let mut out = format!("completed {lesson_id} {}\n", lesson.title());
    if let Some(next) = progress.next_lesson(lesson_id).await? {
        let state = lesson_state(&progress, next.id()).await;
        writeln!(out, "next: {} {} {}", state.marker(), next.id(), next.title())?;
    }
    Ok(out)
}

pub async fn advance(services: &AppServices, lesson_id: LessonId, percent: u8) -> Result<String> {
    let percent = ProgressPercent::new(percent)?;
    let progress = services.progress();
    let (module, lesson) = locate(&progress, lesson_id).await?;
    if !progress.is_accessible(lesson_id).await {
        bail!("lesson {lesson_id} ({}) is still locked", lesson.title());
    }

    let outcome = progress
        .update_progress(module.course_id(), module.id(), lesson_id, percent)
        .await?;
    let current = progress
        .record(lesson_id)
        .map_or(ProgressPercent::ZERO, |record| record.progress());
    Ok(match outcome {
        WriteOutcome::Written => format!("{} now at {current}\n", lesson.title()),
        WriteOutcome::Unchanged => format!("{} already at {current}, unchanged\n", lesson.title()),
    })
}

pub async fn next(services: &AppServices, lesson_id: LessonId) -> Result<String> {
    let progress = services.progress();
    Ok(match progress.next_lesson(lesson_id).await? {
        Some(next) => {
            let state = lesson_state(&progress, next.id()).await;
            format!("{} {} {}\n", state.marker(), next.id(), next.title())
        }
        None => format!("no lesson after {lesson_id}\n"),
    })
}

pub async fn resume(services: &AppServices) -> Result<String> {
    let progress = services.progress();
    let Some(course_id) = progress.last_accessed_course() else {
        let mut out = "nothing started yet\n".to_string();
        stale_note(&mut out, &progress);
        return Ok(out);
    };
    show(services, course_id).await
}
