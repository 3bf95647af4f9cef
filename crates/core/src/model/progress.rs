use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId, ProgressId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress must be between 0 and 100, got {0}")]
    OutOfRange(i64),
}

//
// ─── PERCENT ───────────────────────────────────────────────────────────────────
//

/// Lesson progress as a whole percentage in `0..=100`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct ProgressPercent(u8);

impl ProgressPercent {
    pub const ZERO: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// # Errors
    ///
    /// Returns `ProgressError::OutOfRange` when `value` is above 100.
    pub fn new(value: u8) -> Result<Self, ProgressError> {
        Self::try_from(i64::from(value))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        self.0 == 100
    }
}

impl TryFrom<i64> for ProgressPercent {
    type Error = ProgressError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ProgressError::OutOfRange(value))
    }
}

impl From<ProgressPercent> for u8 {
    fn from(value: ProgressPercent) -> Self {
        value.0
    }
}

impl std::fmt::Display for ProgressPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-user, per-lesson progress row.
///
/// A completed record always carries 100% progress, and progress never
/// moves backwards through the mutators below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    id: Option<ProgressId>,
    user_id: UserId,
    course_id: CourseId,
    module_id: ModuleId,
    lesson_id: LessonId,
    completed: bool,
    progress: ProgressPercent,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// A fresh, unsaved record for a lesson that was just completed.
    #[must_use]
    pub fn new_completed(
        user_id: UserId,
        course_id: CourseId,
        module_id: ModuleId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            course_id,
            module_id,
            lesson_id,
            completed: true,
            progress: ProgressPercent::COMPLETE,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// A fresh, unsaved record carrying partial progress.
    #[must_use]
    pub fn new_partial(
        user_id: UserId,
        course_id: CourseId,
        module_id: ModuleId,
        lesson_id: LessonId,
        progress: ProgressPercent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            course_id,
            module_id,
            lesson_id,
            completed: false,
            progress,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Rebuild a record read back from a store.
    ///
    /// A row flagged completed is normalized to 100% progress.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: ProgressId,
        user_id: UserId,
        course_id: CourseId,
        module_id: ModuleId,
        lesson_id: LessonId,
        completed: bool,
        progress: ProgressPercent,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Some(id),
            user_id,
            course_id,
            module_id,
            lesson_id,
            completed,
            progress: if completed {
                ProgressPercent::COMPLETE
            } else {
                progress
            },
            created_at,
            updated_at,
        }
    }

    /// Attach the store-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: ProgressId) -> Self {
        self.id = Some(id);
        self
    }

    /// Flag the lesson completed, forcing progress to 100%.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.completed = true;
        self.progress = ProgressPercent::COMPLETE;
        self.updated_at = Some(now);
    }

    /// Raise progress to `progress`. Returns `false` and leaves the record
    /// unchanged unless `progress` is strictly greater than the current value.
    pub fn advance(&mut self, progress: ProgressPercent, now: DateTime<Utc>) -> bool {
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = Some(now);
        true
    }

    #[must_use]
    pub fn id(&self) -> Option<ProgressId> {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn progress(&self) -> ProgressPercent {
        self.progress
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}
