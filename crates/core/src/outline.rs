//! Ordering skeleton of a course and the linear unlock rule evaluated over it.
//!
//! A lesson unlocks when the lesson before it (by position in its module) is
//! complete. The first lesson of a module unlocks once every lesson of the
//! previous module (by position in the course) is complete. The first lesson
//! of the first module is always open.

use thiserror::Error;

use crate::model::{CourseId, Lesson, LessonId, Module, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutlineError {
    #[error("module {module} belongs to course {actual}, not {expected}")]
    ForeignModule {
        module: ModuleId,
        expected: CourseId,
        actual: CourseId,
    },

    #[error("lesson {lesson} belongs to module {actual}, not {expected}")]
    ForeignLesson {
        lesson: LessonId,
        expected: ModuleId,
        actual: ModuleId,
    },
}

/// One module of an outline with its lessons sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineModule {
    module: Module,
    lessons: Vec<Lesson>,
}

impl OutlineModule {
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

/// What has to be complete before a lesson may be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// Always open.
    None,
    /// The preceding lesson of the same module.
    Lesson(LessonId),
    /// Every lesson of the preceding module.
    Module {
        module: ModuleId,
        lessons: Vec<LessonId>,
    },
    /// No predecessor could be found for a lesson that needs one, or the
    /// lesson is not part of the outline. Never satisfied.
    Unresolvable,
}

impl Prerequisite {
    /// Check the prerequisite against a completion predicate.
    pub fn is_satisfied(&self, is_completed: impl Fn(LessonId) -> bool) -> bool {
        match self {
            Prerequisite::None => true,
            Prerequisite::Lesson(id) => is_completed(*id),
            Prerequisite::Module { lessons, .. } => lessons.iter().all(|id| is_completed(*id)),
            Prerequisite::Unresolvable => false,
        }
    }
}

/// Modules and lessons of a single course, sorted by their `order` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    course_id: CourseId,
    modules: Vec<OutlineModule>,
}

impl CourseOutline {
    /// Build an outline from unsorted catalog rows.
    ///
    /// # Errors
    ///
    /// Returns `OutlineError` when a module or lesson points at a different
    /// parent than the one it was grouped under.
    pub fn new(
        course_id: CourseId,
        modules: Vec<(Module, Vec<Lesson>)>,
    ) -> Result<Self, OutlineError> {
        let mut outline = Vec::with_capacity(modules.len());
        for (module, mut lessons) in modules {
            if module.course_id() != course_id {
                return Err(OutlineError::ForeignModule {
                    module: module.id(),
                    expected: course_id,
                    actual: module.course_id(),
                });
            }
            if let Some(stray) = lessons.iter().find(|l| l.module_id() != module.id()) {
                return Err(OutlineError::ForeignLesson {
                    lesson: stray.id(),
                    expected: module.id(),
                    actual: stray.module_id(),
                });
            }
            lessons.sort_by_key(Lesson::order);
            outline.push(OutlineModule { module, lessons });
        }
        outline.sort_by_key(|m| m.module.order());

        Ok(Self {
            course_id,
            modules: outline,
        })
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn modules(&self) -> &[OutlineModule] {
        &self.modules
    }

    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    #[must_use]
    pub fn contains_lesson(&self, lesson_id: LessonId) -> bool {
        self.locate(lesson_id).is_some()
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&Lesson> {
        self.locate(lesson_id)
            .map(|(m, l)| &self.modules[m].lessons[l])
    }

    fn locate(&self, lesson_id: LessonId) -> Option<(usize, usize)> {
        self.modules.iter().enumerate().find_map(|(mi, m)| {
            m.lessons
                .iter()
                .position(|l| l.id() == lesson_id)
                .map(|li| (mi, li))
        })
    }

    /// Resolve what must be complete before `lesson_id` opens.
    ///
    /// Predecessors are found by position in the sorted lists, never by
    /// arithmetic on `order`, since order values may have gaps.
    #[must_use]
    pub fn prerequisite(&self, lesson_id: LessonId) -> Prerequisite {
        let Some((mi, li)) = self.locate(lesson_id) else {
            return Prerequisite::Unresolvable;
        };
        let entry = &self.modules[mi];
        let lesson = &entry.lessons[li];

        if lesson.order() == 1 {
            if entry.module.order() == 1 {
                return Prerequisite::None;
            }
            return match mi.checked_sub(1).map(|p| &self.modules[p]) {
                Some(prev) => Prerequisite::Module {
                    module: prev.module.id(),
                    lessons: prev.lessons.iter().map(Lesson::id).collect(),
                },
                None => Prerequisite::Unresolvable,
            };
        }

        match li.checked_sub(1).map(|p| &entry.lessons[p]) {
            Some(prev) => Prerequisite::Lesson(prev.id()),
            None => Prerequisite::Unresolvable,
        }
    }

    /// The lesson that follows `lesson_id`: the next one in its module, or
    /// the first lesson of the next module that has any.
    #[must_use]
    pub fn next_lesson(&self, lesson_id: LessonId) -> Option<&Lesson> {
        let (mi, li) = self.locate(lesson_id)?;
        if let Some(next) = self.modules[mi].lessons.get(li + 1) {
            return Some(next);
        }
        self.modules[mi + 1..]
            .iter()
            .find_map(|m| m.lessons.first())
    }
}
