use async_trait::async_trait;
use learn_core::model::{
    Course, CourseId, Lesson, LessonId, Module, ModuleId, ProgressId, ProgressRecord, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Read side of the course catalog.
///
/// Lookups by id return `Ok(None)` on a miss; list calls return an empty
/// vector. Errors are reserved for the store itself failing.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// All courses ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Modules of a course sorted by `order` ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn modules_by_course(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError>;

    /// Lessons of a module sorted by `order` ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn lessons_by_module(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError>;
}

/// Write side of the catalog, used for seeding.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;
}

/// Per-user progress rows.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Every progress row belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Insert a record without an id, or update the row with the record's id.
    /// Returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when inserting a second row for the same
    /// (user, lesson) pair, `StorageError::NotFound` when updating a missing id,
    /// or other storage errors.
    async fn upsert_progress(&self, record: &ProgressRecord)
    -> Result<ProgressRecord, StorageError>;
}

#[derive(Default)]
struct ProgressTable {
    next_id: u64,
    rows: HashMap<ProgressId, ProgressRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    modules: Arc<Mutex<HashMap<ModuleId, Module>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    progress: Arc<Mutex<ProgressTable>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by_key(Course::id);
        Ok(courses)
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let guard = self.modules.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn modules_by_course(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError> {
        let guard = self.modules.lock().map_err(poisoned)?;
        let mut modules: Vec<Module> = guard
            .values()
            .filter(|m| m.course_id() == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| (m.order(), m.id()));
        Ok(modules)
    }

    async fn lessons_by_module(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lessons.lock().map_err(poisoned)?;
        let mut lessons: Vec<Lesson> = guard
            .values()
            .filter(|l| l.module_id() == module_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order(), l.id()));
        Ok(lessons)
    }
}

#[async_trait]
impl CatalogWriter for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = self.modules.lock().map_err(poisoned)?;
        guard.insert(module.id(), module.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lessons.lock().map_err(poisoned)?;
        guard.insert(lesson.id(), lesson.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut rows: Vec<ProgressRecord> = guard
            .rows
            .values()
            .filter(|r| r.user_id() == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(ProgressRecord::id);
        Ok(rows)
    }

    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        match record.id() {
            Some(id) => {
                let existing = guard.rows.get(&id).ok_or(StorageError::NotFound)?;
                if existing.user_id() != record.user_id()
                    || existing.lesson_id() != record.lesson_id()
                {
                    return Err(StorageError::Conflict);
                }
                // created_at stays as first written
                let stored = ProgressRecord::from_persisted(
                    id,
                    record.user_id(),
                    record.course_id(),
                    record.module_id(),
                    record.lesson_id(),
                    record.is_completed(),
                    record.progress(),
                    existing.created_at(),
                    record.updated_at(),
                );
                guard.rows.insert(id, stored.clone());
                Ok(stored)
            }
            None => {
                let duplicate = guard.rows.values().any(|r| {
                    r.user_id() == record.user_id() && r.lesson_id() == record.lesson_id()
                });
                if duplicate {
                    return Err(StorageError::Conflict);
                }
                guard.next_id += 1;
                let id = ProgressId::new(guard.next_id);
                let stored = record.clone().with_id(id);
                guard.rows.insert(id, stored.clone());
                Ok(stored)
            }
        }
    }
}

/// Aggregates catalog and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub catalog_writer: Arc<dyn CatalogWriter>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one backend across all three roles.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: CatalogRepository + CatalogWriter + ProgressRepository + Clone + 'static,
    {
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let catalog_writer: Arc<dyn CatalogWriter> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            catalog,
            catalog_writer,
            progress,
        }
    }
}
