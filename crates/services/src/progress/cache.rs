use std::collections::HashMap;

use learn_core::model::{CourseId, LessonId, ModuleId, ProgressRecord};

/// Whether the cached snapshot reflects the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing loaded yet in this session.
    Empty,
    /// Last refresh succeeded.
    Fresh,
    /// Last refresh failed; the previous snapshot (possibly empty) is kept.
    Stale,
}

/// Outcome of a refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Loaded(usize),
    Stale,
    /// The session was cleared while the read was in flight; the result
    /// was dropped.
    Discarded,
}

/// Snapshot of one user's progress rows, indexed by lesson.
#[derive(Debug, Clone)]
pub struct ProgressCache {
    by_lesson: HashMap<LessonId, ProgressRecord>,
    status: CacheStatus,
    generation: u64,
}

impl Default for ProgressCache {
    fn default() -> Self {
        Self {
            by_lesson: HashMap::new(),
            status: CacheStatus::Empty,
            generation: 0,
        }
    }
}

impl ProgressCache {
    /// Swap in a complete snapshot.
    ///
    /// Should the store ever hand back two rows for one lesson, the more
    /// advanced one wins so a completed lesson never reads as incomplete.
    pub fn replace(&mut self, records: Vec<ProgressRecord>) {
        let mut by_lesson: HashMap<LessonId, ProgressRecord> =
            HashMap::with_capacity(records.len());
        for record in records {
            match by_lesson.get(&record.lesson_id()) {
                Some(kept) if rank(kept) >= rank(&record) => {}
                _ => {
                    by_lesson.insert(record.lesson_id(), record);
                }
            }
        }
        self.by_lesson = by_lesson;
        self.status = CacheStatus::Fresh;
    }

    pub fn mark_stale(&mut self) {
        self.status = CacheStatus::Stale;
    }

    /// Empty the cache and start a new generation, so snapshots read
    /// before the clear can be told apart.
    pub fn clear(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn status(&self) -> CacheStatus {
        self.status
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_lesson.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_lesson.is_empty()
    }

    #[must_use]
    pub fn get(&self, lesson_id: LessonId) -> Option<&ProgressRecord> {
        self.by_lesson.get(&lesson_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.by_lesson.values()
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        self.get(lesson_id).is_some_and(ProgressRecord::is_completed)
    }

    #[must_use]
    pub fn completed_in_module(&self, module_id: ModuleId) -> usize {
        self.records()
            .filter(|r| r.module_id() == module_id && r.is_completed())
            .count()
    }

    #[must_use]
    pub fn completed_in_course(&self, course_id: CourseId) -> usize {
        self.records()
            .filter(|r| r.course_id() == course_id && r.is_completed())
            .count()
    }

    /// Course of the most recently updated row; rows without a timestamp
    /// are ignored.
    #[must_use]
    pub fn last_accessed_course(&self) -> Option<CourseId> {
        self.records()
            .filter_map(|r| r.updated_at().map(|at| (at, r.course_id())))
            .max_by_key(|(at, _)| *at)
            .map(|(_, course)| course)
    }
}

fn rank(record: &ProgressRecord) -> (bool, u8) {
    (record.is_completed(), record.progress().value())
}
