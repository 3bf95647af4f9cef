mod catalog;
mod ids;
mod progress;

pub use ids::{CourseId, LessonId, ModuleId, ParseIdError, ProgressId, UserId};

pub use catalog::{CatalogError, Course, Lesson, LessonKind, Module};
pub use progress::{ProgressError, ProgressPercent, ProgressRecord};
