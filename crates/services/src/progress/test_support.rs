//! Store wrappers used by the progress tests: call counting, injected
//! failures, artificial latency and forced interleaving.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use learn_core::model::{
    Course, CourseId, Lesson, LessonId, LessonKind, Module, ModuleId, ProgressRecord, UserId,
};
use storage::repository::{
    CatalogRepository, CatalogWriter, InMemoryRepository, ProgressRepository, StorageError,
};

#[derive(Default)]
pub(crate) struct TestStore {
    pub inner: InMemoryRepository,
    pub fail_progress_reads: AtomicBool,
    pub fail_progress_writes: AtomicBool,
    pub fail_catalog: AtomicBool,
    pub yield_on_write: AtomicBool,
    pub catalog_delay: std::sync::Mutex<Option<Duration>>,
    pub progress_read_delay: std::sync::Mutex<Option<Duration>>,
    pub progress_write_delay: std::sync::Mutex<Option<Duration>>,
    pub catalog_calls: AtomicUsize,
    pub progress_reads: AtomicUsize,
    pub progress_writes: AtomicUsize,
}

fn unavailable() -> StorageError {
    StorageError::Connection("store unavailable".into())
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn catalog_gate(&self) -> Result<(), StorageError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.catalog_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    /// Seed a course from `(module_id, order, [(lesson_id, order)])` rows.
    pub async fn seed(&self, course: u64, modules: &[(u64, u32, &[(u64, u32)])]) {
        let course_id = CourseId::new(course);
        self.inner
            .upsert_course(&Course::new(course_id, format!("Course {course}"), Vec::new(), false).unwrap())
            .await
            .unwrap();
        for (module_id, module_order, lessons) in modules {
            let module =
                Module::new(ModuleId::new(*module_id), course_id, format!("Module {module_id}"), *module_order)
                    .unwrap();
            self.inner.upsert_module(&module).await.unwrap();
            for (lesson_id, lesson_order) in *lessons {
                let lesson = Lesson::new(
                    LessonId::new(*lesson_id),
                    module.id(),
                    format!("Lesson {lesson_id}"),
                    *lesson_order,
                    LessonKind::Video,
                )
                .unwrap();
                self.inner.upsert_lesson(&lesson).await.unwrap();
            }
        }
    }
}

#[async_trait]
impl CatalogRepository for TestStore {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        self.catalog_gate().await?;
        self.inner.get_course(id).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        self.catalog_gate().await?;
        self.inner.list_courses().await
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        self.catalog_gate().await?;
        self.inner.get_module(id).await
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        self.catalog_gate().await?;
        self.inner.get_lesson(id).await
    }

    async fn modules_by_course(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError> {
        self.catalog_gate().await?;
        self.inner.modules_by_course(course_id).await
    }

    async fn lessons_by_module(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        self.catalog_gate().await?;
        self.inner.lessons_by_module(module_id).await
    }
}

#[async_trait]
impl ProgressRepository for TestStore {
    async fn progress_for_user(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        self.progress_reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.progress_read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_progress_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.progress_for_user(user_id).await
    }

    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, StorageError> {
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.progress_write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.yield_on_write.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
        }
        if self.fail_progress_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.upsert_progress(record).await
    }
}
