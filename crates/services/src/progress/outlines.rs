use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use learn_core::CourseOutline;
use learn_core::model::{CourseId, LessonId};

#[derive(Default)]
struct Inner {
    by_course: HashMap<CourseId, Arc<CourseOutline>>,
    course_of_lesson: HashMap<LessonId, CourseId>,
}

/// Course outlines loaded this session, plus a lesson -> course index so a
/// known lesson resolves without touching the store.
#[derive(Default)]
pub(crate) struct OutlineCache {
    inner: Mutex<Inner>,
}

impl OutlineCache {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn for_lesson(&self, lesson_id: LessonId) -> Option<Arc<CourseOutline>> {
        let inner = self.lock();
        let course = inner.course_of_lesson.get(&lesson_id)?;
        inner.by_course.get(course).cloned()
    }

    pub(crate) fn for_course(&self, course_id: CourseId) -> Option<Arc<CourseOutline>> {
        self.lock().by_course.get(&course_id).cloned()
    }

    pub(crate) fn insert(&self, outline: CourseOutline) -> Arc<CourseOutline> {
        let outline = Arc::new(outline);
        let mut inner = self.lock();
        let course = outline.course_id();
        inner.course_of_lesson.retain(|_, c| *c != course);
        for lesson in outline.lessons() {
            inner.course_of_lesson.insert(lesson.id(), course);
        }
        inner.by_course.insert(course, Arc::clone(&outline));
        outline
    }

    pub(crate) fn clear(&self) {
        *self.lock() = Inner::default();
    }
}
