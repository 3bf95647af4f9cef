use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("order must be >= 1")]
    InvalidOrder,

    #[error("unknown lesson kind: {0}")]
    UnknownLessonKind(String),
}

fn validated_title(title: impl Into<String>) -> Result<String, CatalogError> {
    let title = title.into();
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course as published in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    tags: Vec<String>,
    premium: bool,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        tags: Vec<String>,
        premium: bool,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: validated_title(title)?,
            tags,
            premium,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tags in catalog order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.premium
    }
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// A module of a course. `order` is 1-based and unique within the course;
/// gaps are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    id: ModuleId,
    course_id: CourseId,
    title: String,
    order: u32,
}

impl Module {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` for a blank title and
    /// `CatalogError::InvalidOrder` when `order` is 0.
    pub fn new(
        id: ModuleId,
        course_id: CourseId,
        title: impl Into<String>,
        order: u32,
    ) -> Result<Self, CatalogError> {
        if order == 0 {
            return Err(CatalogError::InvalidOrder);
        }
        Ok(Self {
            id,
            course_id,
            title: validated_title(title)?,
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// What a lesson delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    Video,
    Text,
    Quiz,
}

impl LessonKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonKind::Video => "video",
            LessonKind::Text => "text",
            LessonKind::Quiz => "quiz",
        }
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(LessonKind::Video),
            "text" => Ok(LessonKind::Text),
            "quiz" => Ok(LessonKind::Quiz),
            other => Err(CatalogError::UnknownLessonKind(other.to_owned())),
        }
    }
}

/// A lesson of a module. `order` is 1-based and unique within the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    module_id: ModuleId,
    title: String,
    order: u32,
    kind: LessonKind,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` for a blank title and
    /// `CatalogError::InvalidOrder` when `order` is 0.
    pub fn new(
        id: LessonId,
        module_id: ModuleId,
        title: impl Into<String>,
        order: u32,
        kind: LessonKind,
    ) -> Result<Self, CatalogError> {
        if order == 0 {
            return Err(CatalogError::InvalidOrder);
        }
        Ok(Self {
            id,
            module_id,
            title: validated_title(title)?,
            order,
            kind,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        self.kind
    }
}
