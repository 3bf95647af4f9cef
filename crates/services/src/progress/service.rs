use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use learn_core::model::{
    Course, CourseId, Lesson, LessonId, Module, ModuleId, ProgressPercent, ProgressRecord, UserId,
};
use learn_core::{Clock, CourseOutline};
use storage::repository::{CatalogRepository, ProgressRepository, StorageError};

use super::cache::{CacheStatus, ProgressCache, RefreshStatus};
use super::locks::LessonLocks;
use super::outlines::OutlineCache;
use crate::config::ProgressConfig;
use crate::error::ProgressServiceError;

/// Result of a progress write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A row was inserted or updated and the cache refreshed.
    Written,
    /// The request would not move progress forward; nothing was sent.
    Unchanged,
}

/// Completed vs. total lessons for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseCompletion {
    pub completed: usize,
    pub total: usize,
}

impl CourseCompletion {
    /// Whole percentage, 0 for an empty course and never above 100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.completed.min(self.total) * 100) / self.total;
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Progress and lesson-unlock engine for one signed-in user.
///
/// Completion queries read the in-memory snapshot; accessibility and lesson
/// totals go through the Catalog Store. Writes go to the store first and the
/// snapshot is re-pulled afterwards, so it only ever holds what the store
/// returned.
pub struct ProgressService {
    user_id: UserId,
    clock: Clock,
    config: ProgressConfig,
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
    cache: RwLock<ProgressCache>,
    outlines: OutlineCache,
    write_locks: LessonLocks,
    refresh_gate: AsyncMutex<()>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        user_id: UserId,
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            user_id,
            clock,
            config: ProgressConfig::default(),
            catalog,
            progress,
            cache: RwLock::new(ProgressCache::default()),
            outlines: OutlineCache::default(),
            write_locks: LessonLocks::default(),
            refresh_gate: AsyncMutex::new(()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProgressConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, ProgressCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, ProgressCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        let limit = self.config.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StorageError::Timeout(limit))?
    }

    //
    // ─── CACHE ─────────────────────────────────────────────────────────────────
    //

    /// Reload every progress row of the user from the store.
    ///
    /// A failed read never raises: it is logged, the previous snapshot stays
    /// in place, and the cache is flagged `CacheStatus::Stale`.
    ///
    /// A read that overlaps `clear()` is dropped and reported as
    /// `RefreshStatus::Discarded`.
    pub async fn refresh(&self) -> RefreshStatus {
        let generation = self.read_cache().generation();
        self.refresh_since(generation).await
    }

    /// Refresh unless the cache was cleared after `generation` was read.
    async fn refresh_since(&self, generation: u64) -> RefreshStatus {
        let _gate = self.refresh_gate.lock().await;
        let result = self.bounded(self.progress.progress_for_user(self.user_id)).await;

        let mut cache = self.write_cache();
        if cache.generation() != generation {
            debug!(user_id = %self.user_id, "session cleared during refresh, dropping result");
            return RefreshStatus::Discarded;
        }
        match result {
            Ok(records) => {
                let count = records.len();
                cache.replace(records);
                debug!(user_id = %self.user_id, count, "progress refreshed");
                RefreshStatus::Loaded(count)
            }
            Err(err) => {
                warn!(user_id = %self.user_id, error = %err, "progress refresh failed, keeping previous snapshot");
                cache.mark_stale();
                RefreshStatus::Stale
            }
        }
    }

    /// Drop everything held for this session (sign-out). Refreshes already
    /// in flight are discarded when they complete.
    pub fn clear(&self) {
        self.write_cache().clear();
        self.outlines.clear();
    }

    /// Forget cached course outlines so the next check reloads ordering.
    pub fn invalidate_outlines(&self) {
        self.outlines.clear();
    }

    #[must_use]
    pub fn cache_status(&self) -> CacheStatus {
        self.read_cache().status()
    }

    /// Snapshot of the cached rows.
    #[must_use]
    pub fn records(&self) -> Vec<ProgressRecord> {
        self.read_cache().records().cloned().collect()
    }

    #[must_use]
    pub fn record(&self, lesson_id: LessonId) -> Option<ProgressRecord> {
        self.read_cache().get(lesson_id).cloned()
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        self.read_cache().is_completed(lesson_id)
    }

    #[must_use]
    pub fn completed_in_module(&self, module_id: ModuleId) -> usize {
        self.read_cache().completed_in_module(module_id)
    }

    #[must_use]
    pub fn completed_in_course(&self, course_id: CourseId) -> usize {
        self.read_cache().completed_in_course(course_id)
    }

    #[must_use]
    pub fn last_accessed_course(&self) -> Option<CourseId> {
        self.read_cache().last_accessed_course()
    }

    /// Number of lessons in a module, read from the store.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn total_in_module(&self, module_id: ModuleId) -> Result<usize, ProgressServiceError> {
        let lessons = self.bounded(self.catalog.lessons_by_module(module_id)).await?;
        Ok(lessons.len())
    }

    /// Number of lessons across all modules of a course, read from the store.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn total_in_course(&self, course_id: CourseId) -> Result<usize, ProgressServiceError> {
        let modules = self.bounded(self.catalog.modules_by_course(course_id)).await?;
        let mut total = 0;
        for module in modules {
            total += self.total_in_module(module.id()).await?;
        }
        Ok(total)
    }

    /// Completed and total lesson counts for a course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the lesson total cannot be read.
    pub async fn course_completion(
        &self,
        course_id: CourseId,
    ) -> Result<CourseCompletion, ProgressServiceError> {
        let completed = self.completed_in_course(course_id);
        let total = self.total_in_course(course_id).await?;
        Ok(CourseCompletion { completed, total })
    }

    //
    // ─── CATALOG ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn courses(&self) -> Result<Vec<Course>, ProgressServiceError> {
        Ok(self.bounded(self.catalog.list_courses()).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn course(&self, course_id: CourseId) -> Result<Option<Course>, ProgressServiceError> {
        Ok(self.bounded(self.catalog.get_course(course_id)).await?)
    }

    /// The lesson and its parent module, `None` if either is missing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn locate_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Option<(Module, Lesson)>, ProgressServiceError> {
        let Some(lesson) = self.bounded(self.catalog.get_lesson(lesson_id)).await? else {
            return Ok(None);
        };
        let module = self.bounded(self.catalog.get_module(lesson.module_id())).await?;
        Ok(module.map(|module| (module, lesson)))
    }

    /// Ordered modules and lessons of a course, from the outline cache when
    /// already loaded.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the catalog cannot be read or is
    /// inconsistent.
    pub async fn outline(&self, course_id: CourseId) -> Result<Arc<CourseOutline>, ProgressServiceError> {
        if let Some(outline) = self.outlines.for_course(course_id) {
            return Ok(outline);
        }
        self.load_outline(course_id).await
    }

    //
    // ─── ACCESS ────────────────────────────────────────────────────────────────
    //

    async fn load_outline(&self, course_id: CourseId) -> Result<Arc<CourseOutline>, ProgressServiceError> {
        let modules = self.bounded(self.catalog.modules_by_course(course_id)).await?;
        let mut rows = Vec::with_capacity(modules.len());
        for module in modules {
            let lessons = self.bounded(self.catalog.lessons_by_module(module.id())).await?;
            rows.push((module, lessons));
        }
        let outline = CourseOutline::new(course_id, rows)?;
        debug!(course_id = %course_id, lessons = outline.total_lessons(), "course outline loaded");
        Ok(self.outlines.insert(outline))
    }

    /// Outline of the course containing `lesson_id`, or `None` when the
    /// lesson or its module is not in the catalog.
    async fn outline_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Option<Arc<CourseOutline>>, ProgressServiceError> {
        if let Some(outline) = self.outlines.for_lesson(lesson_id) {
            return Ok(Some(outline));
        }

        let Some(lesson) = self.bounded(self.catalog.get_lesson(lesson_id)).await? else {
            return Ok(None);
        };
        let Some(module) = self.bounded(self.catalog.get_module(lesson.module_id())).await? else {
            return Ok(None);
        };
        if let Some(outline) = self.outlines.for_course(module.course_id()) {
            if outline.contains_lesson(lesson_id) {
                return Ok(Some(outline));
            }
        }
        self.load_outline(module.course_id()).await.map(Some)
    }

    /// Whether the user may open `lesson_id` right now.
    ///
    /// Completed lessons are always open. Otherwise the linear unlock rule
    /// applies. Missing catalog rows, missing predecessors and store failures
    /// all resolve to `false`.
    pub async fn is_accessible(&self, lesson_id: LessonId) -> bool {
        if self.is_completed(lesson_id) {
            return true;
        }

        let outline = match self.outline_for_lesson(lesson_id).await {
            Ok(Some(outline)) => outline,
            Ok(None) => {
                debug!(lesson_id = %lesson_id, "lesson or module not in catalog, denying access");
                return false;
            }
            Err(err) => {
                warn!(lesson_id = %lesson_id, error = %err, "could not resolve lesson ordering, denying access");
                return false;
            }
        };

        let prerequisite = outline.prerequisite(lesson_id);
        let cache = self.read_cache();
        prerequisite.is_satisfied(|id| cache.is_completed(id))
    }

    /// The lesson after `lesson_id` in course order, crossing into the next
    /// module after a module's last lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the catalog cannot be read.
    pub async fn next_lesson(&self, lesson_id: LessonId) -> Result<Option<Lesson>, ProgressServiceError> {
        let outline = self.outline_for_lesson(lesson_id).await?;
        Ok(outline.and_then(|o| o.next_lesson(lesson_id).cloned()))
    }

    //
    // ─── WRITES ────────────────────────────────────────────────────────────────
    //

    /// Record `lesson_id` as completed (100%).
    ///
    /// Updates the existing row for the lesson or inserts one, then refreshes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails; the cache is
    /// left as it was.
    pub async fn mark_completed(
        &self,
        course_id: CourseId,
        module_id: ModuleId,
        lesson_id: LessonId,
    ) -> Result<(), ProgressServiceError> {
        let _lesson_guard = self.write_locks.acquire(lesson_id).await;
        let now = self.clock.now();

        let record = match self.record(lesson_id) {
            Some(mut existing) => {
                existing.mark_completed(now);
                existing
            }
            None => ProgressRecord::new_completed(self.user_id, course_id, module_id, lesson_id, now),
        };

        self.persist(record, |existing| {
            existing.mark_completed(now);
            true
        })
        .await?;
        info!(user_id = %self.user_id, lesson_id = %lesson_id, "lesson completed");
        Ok(())
    }

    /// Raise progress on `lesson_id` to `percent`.
    ///
    /// Values at or below the cached progress are ignored without touching
    /// the store. Never flags the lesson completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails; the cache is
    /// left as it was.
    pub async fn update_progress(
        &self,
        course_id: CourseId,
        module_id: ModuleId,
        lesson_id: LessonId,
        percent: ProgressPercent,
    ) -> Result<WriteOutcome, ProgressServiceError> {
        let _lesson_guard = self.write_locks.acquire(lesson_id).await;
        let now = self.clock.now();

        let record = match self.record(lesson_id) {
            Some(mut existing) => {
                if !existing.advance(percent, now) {
                    debug!(lesson_id = %lesson_id, %percent, current = %existing.progress(), "progress not advanced, skipping write");
                    return Ok(WriteOutcome::Unchanged);
                }
                existing
            }
            None => ProgressRecord::new_partial(
                self.user_id,
                course_id,
                module_id,
                lesson_id,
                percent,
                now,
            ),
        };

        let outcome = self
            .persist(record, |existing| existing.advance(percent, now))
            .await?;
        Ok(outcome)
    }

    /// Send `record` to the store and refresh.
    ///
    /// An insert can collide with a row the cache never saw (for example
    /// after a failed refresh). In that case the cache is reloaded and
    /// `reapply` is run against the stored row instead.
    async fn persist(
        &self,
        record: ProgressRecord,
        reapply: impl FnOnce(&mut ProgressRecord) -> bool,
    ) -> Result<WriteOutcome, ProgressServiceError> {
        let lesson_id = record.lesson_id();
        let generation = self.read_cache().generation();
        match self.bounded(self.progress.upsert_progress(&record)).await {
            Ok(_) => {}
            Err(StorageError::Conflict) if record.id().is_none() => {
                debug!(lesson_id = %lesson_id, "progress row already exists in store, retrying as update");
                self.refresh_since(generation).await;
                let Some(mut existing) = self.record(lesson_id) else {
                    return Err(StorageError::Conflict.into());
                };
                if !reapply(&mut existing) {
                    return Ok(WriteOutcome::Unchanged);
                }
                self.bounded(self.progress.upsert_progress(&existing))
                    .await
                    .map_err(|err| self.write_failed(lesson_id, err))?;
            }
            Err(err) => return Err(self.write_failed(lesson_id, err)),
        }

        if self.refresh_since(generation).await == RefreshStatus::Stale {
            warn!(lesson_id = %lesson_id, "progress written but cache could not be refreshed");
        }
        Ok(WriteOutcome::Written)
    }

    fn write_failed(&self, lesson_id: LessonId, err: StorageError) -> ProgressServiceError {
        warn!(user_id = %self.user_id, lesson_id = %lesson_id, error = %err, "progress write failed");
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use learn_core::time::fixed_now;

    use crate::progress::test_support::TestStore;

    const COURSE: CourseId = CourseId::new(1);
    const M1: ModuleId = ModuleId::new(10);
    const M2: ModuleId = ModuleId::new(20);
    const L101: LessonId = LessonId::new(101);
    const L102: LessonId = LessonId::new(102);
    const L201: LessonId = LessonId::new(201);
    const L202: LessonId = LessonId::new(202);

    async fn seeded() -> Arc<TestStore> {
        let store = TestStore::new();
        store
            .seed(1, &[(10, 1, &[(101, 1), (102, 2)]), (20, 2, &[(201, 1), (202, 2)])])
            .await;
        store
    }

    fn service(store: &Arc<TestStore>) -> ProgressService {
        ProgressService::new(
            UserId::new(1),
            Clock::fixed(fixed_now()),
            store.clone(),
            store.clone(),
        )
    }

    fn pct(value: u8) -> ProgressPercent {
        ProgressPercent::new(value).unwrap()
    }

    #[tokio::test]
    async fn first_lesson_of_first_module_is_always_open() {
        let store = seeded().await;
        let svc = service(&store);
        assert!(svc.is_accessible(L101).await);

        store.fail_progress_reads.store(true, Ordering::SeqCst);
        assert_eq!(svc.refresh().await, RefreshStatus::Stale);
        assert!(svc.is_accessible(L101).await);
    }

    #[tokio::test]
    async fn later_lesson_unlocks_after_its_predecessor() {
        let store = seeded().await;
        let svc = service(&store);
        assert!(!svc.is_accessible(L102).await);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        assert!(svc.is_accessible(L102).await);
        assert!(!svc.is_accessible(L202).await);
    }

    #[tokio::test]
    async fn next_module_needs_every_lesson_of_the_previous_one() {
        let store = seeded().await;
        let svc = service(&store);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        assert!(!svc.is_accessible(L201).await);

        svc.update_progress(COURSE, M1, L102, pct(90)).await.unwrap();
        assert!(!svc.is_accessible(L201).await);

        svc.mark_completed(COURSE, M1, L102).await.unwrap();
        assert!(svc.is_accessible(L201).await);
    }

    #[tokio::test]
    async fn predecessors_are_found_by_position_not_arithmetic() {
        let store = TestStore::new();
        store
            .seed(2, &[(30, 1, &[(301, 1), (305, 5), (309, 9)]), (40, 4, &[(401, 1)])])
            .await;
        let svc = service(&store);

        assert!(!svc.is_accessible(LessonId::new(305)).await);
        svc.mark_completed(CourseId::new(2), ModuleId::new(30), LessonId::new(301))
            .await
            .unwrap();
        assert!(svc.is_accessible(LessonId::new(305)).await);
        assert!(!svc.is_accessible(LessonId::new(309)).await);

        for lesson in [305, 309] {
            svc.mark_completed(CourseId::new(2), ModuleId::new(30), LessonId::new(lesson))
                .await
                .unwrap();
        }
        // module order 4 directly follows module order 1
        assert!(svc.is_accessible(LessonId::new(401)).await);
    }

    #[tokio::test]
    async fn unknown_lessons_and_orphaned_modules_are_denied() {
        let store = seeded().await;
        let orphan = Lesson::new(
            LessonId::new(900),
            ModuleId::new(77),
            "Orphan",
            1,
            learn_core::model::LessonKind::Text,
        )
        .unwrap();
        storage::repository::CatalogWriter::upsert_lesson(&store.inner, &orphan)
            .await
            .unwrap();
        let svc = service(&store);

        assert!(!svc.is_accessible(LessonId::new(999)).await);
        assert!(!svc.is_accessible(LessonId::new(900)).await);
    }

    #[tokio::test]
    async fn catalog_failure_denies_unless_completed() {
        let store = seeded().await;
        let svc = service(&store);
        svc.mark_completed(COURSE, M1, L101).await.unwrap();

        store.fail_catalog.store(true, Ordering::SeqCst);
        assert!(!svc.is_accessible(L102).await);
        assert!(svc.is_accessible(L101).await);
    }

    #[tokio::test]
    async fn slow_catalog_times_out_and_denies() {
        let store = seeded().await;
        *store.catalog_delay.lock().unwrap() = Some(Duration::from_secs(60));
        let svc = service(&store)
            .with_config(ProgressConfig::default().with_store_timeout(Duration::from_millis(20)));

        let started = std::time::Instant::now();
        assert!(!svc.is_accessible(L101).await);
        assert!(started.elapsed() < Duration::from_secs(5));

        let err = svc.total_in_module(M1).await.unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Storage(StorageError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn outline_is_loaded_once_per_course() {
        let store = seeded().await;
        let svc = service(&store);

        assert!(svc.is_accessible(L101).await);
        let after_first = store.catalog_calls.load(Ordering::SeqCst);
        assert!(after_first > 0);

        assert!(!svc.is_accessible(L202).await);
        assert!(!svc.is_accessible(L102).await);
        assert_eq!(store.catalog_calls.load(Ordering::SeqCst), after_first);

        svc.invalidate_outlines();
        svc.is_accessible(L102).await;
        assert!(store.catalog_calls.load(Ordering::SeqCst) > after_first);
    }

    #[tokio::test]
    async fn completion_is_visible_right_after_mark_completed() {
        let store = seeded().await;
        let svc = service(&store);
        assert!(!svc.is_completed(L101));

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        assert!(svc.is_completed(L101));
        let record = svc.record(L101).unwrap();
        assert_eq!(record.progress(), ProgressPercent::COMPLETE);
        assert_eq!(record.created_at(), record.updated_at());
        assert_eq!(svc.cache_status(), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn later_writes_move_updated_at_but_keep_created_at() {
        let store = seeded().await;
        let mut clock = Clock::fixed(fixed_now());
        let early = ProgressService::new(UserId::new(1), clock, store.clone(), store.clone());
        early.update_progress(COURSE, M1, L101, pct(30)).await.unwrap();

        clock.advance(chrono::Duration::hours(1));
        let later = ProgressService::new(UserId::new(1), clock, store.clone(), store.clone());
        later.refresh().await;
        later.mark_completed(COURSE, M1, L101).await.unwrap();

        let record = later.record(L101).unwrap();
        assert_eq!(record.created_at(), Some(fixed_now()));
        assert_eq!(
            record.updated_at(),
            Some(fixed_now() + chrono::Duration::hours(1))
        );
        assert!(record.is_completed());
    }

    #[tokio::test]
    async fn mark_completed_twice_keeps_a_single_row() {
        let store = seeded().await;
        let svc = service(&store);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        svc.mark_completed(COURSE, M1, L101).await.unwrap();

        let rows = store.inner.progress_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_completed());
    }

    #[tokio::test]
    async fn update_progress_never_moves_backwards() {
        let store = seeded().await;
        let svc = service(&store);

        let outcome = svc.update_progress(COURSE, M1, L101, pct(60)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        let writes = store.progress_writes.load(Ordering::SeqCst);
        let reads = store.progress_reads.load(Ordering::SeqCst);

        for lower in [60, 40, 0] {
            let outcome = svc.update_progress(COURSE, M1, L101, pct(lower)).await.unwrap();
            assert_eq!(outcome, WriteOutcome::Unchanged);
        }
        assert_eq!(store.progress_writes.load(Ordering::SeqCst), writes);
        assert_eq!(store.progress_reads.load(Ordering::SeqCst), reads);

        let rows = store.inner.progress_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(rows[0].progress().value(), 60);

        svc.update_progress(COURSE, M1, L101, pct(80)).await.unwrap();
        assert_eq!(svc.record(L101).unwrap().progress().value(), 80);
    }

    #[tokio::test]
    async fn update_progress_does_not_complete_and_cannot_undo_completion() {
        let store = seeded().await;
        let svc = service(&store);

        svc.update_progress(COURSE, M1, L101, pct(100)).await.unwrap();
        assert!(!svc.is_completed(L101));

        svc.mark_completed(COURSE, M1, L102).await.unwrap();
        let outcome = svc.update_progress(COURSE, M1, L102, pct(50)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(svc.is_completed(L102));
    }

    #[tokio::test]
    async fn failed_writes_leave_the_cache_untouched() {
        let store = seeded().await;
        let svc = service(&store);
        svc.update_progress(COURSE, M1, L101, pct(20)).await.unwrap();
        let before = svc.records();

        store.fail_progress_writes.store(true, Ordering::SeqCst);
        let err = svc.mark_completed(COURSE, M1, L101).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::Storage(_)));
        assert!(svc.update_progress(COURSE, M1, L102, pct(10)).await.is_err());

        assert_eq!(svc.records(), before);
        assert!(!svc.is_completed(L101));
        assert_eq!(svc.cache_status(), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let store = seeded().await;
        let svc = service(&store);
        assert_eq!(svc.cache_status(), CacheStatus::Empty);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        store.fail_progress_reads.store(true, Ordering::SeqCst);

        assert_eq!(svc.refresh().await, RefreshStatus::Stale);
        assert_eq!(svc.cache_status(), CacheStatus::Stale);
        assert!(svc.is_completed(L101));

        store.fail_progress_reads.store(false, Ordering::SeqCst);
        assert_eq!(svc.refresh().await, RefreshStatus::Loaded(1));
        assert_eq!(svc.cache_status(), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn write_lands_even_when_the_follow_up_refresh_fails() {
        let store = seeded().await;
        let svc = service(&store);
        store.fail_progress_reads.store(true, Ordering::SeqCst);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        assert_eq!(svc.cache_status(), CacheStatus::Stale);
        assert!(!svc.is_completed(L101));

        store.fail_progress_reads.store(false, Ordering::SeqCst);
        svc.refresh().await;
        assert!(svc.is_completed(L101));
    }

    #[tokio::test]
    async fn insert_collision_is_retried_as_update() {
        let store = seeded().await;
        let existing = ProgressRecord::new_partial(
            UserId::new(1),
            COURSE,
            M1,
            L101,
            pct(30),
            fixed_now(),
        );
        store.inner.upsert_progress(&existing).await.unwrap();

        // never refreshed, so the cache does not know about the row
        let svc = service(&store);
        svc.mark_completed(COURSE, M1, L101).await.unwrap();

        let rows = store.inner.progress_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_completed());
    }

    #[tokio::test]
    async fn concurrent_writes_for_one_lesson_produce_one_row() {
        let store = seeded().await;
        store.yield_on_write.store(true, Ordering::SeqCst);
        let svc = service(&store);

        let (completed, updated) = tokio::join!(
            svc.mark_completed(COURSE, M1, L101),
            svc.update_progress(COURSE, M1, L101, pct(30)),
        );
        completed.unwrap();
        updated.unwrap();

        let rows = store.inner.progress_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(svc.is_completed(L101));
    }

    #[tokio::test]
    async fn counts_combine_cache_and_store() {
        let store = seeded().await;
        let svc = service(&store);

        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        svc.mark_completed(COURSE, M2, L201).await.unwrap();
        svc.update_progress(COURSE, M2, L202, pct(40)).await.unwrap();

        assert_eq!(svc.completed_in_module(M1), 1);
        assert_eq!(svc.completed_in_module(M2), 1);
        assert_eq!(svc.completed_in_course(COURSE), 2);
        assert_eq!(svc.total_in_module(M1).await.unwrap(), 2);
        assert_eq!(svc.total_in_course(COURSE).await.unwrap(), 4);
        assert_eq!(svc.total_in_course(CourseId::new(99)).await.unwrap(), 0);

        let completion = svc.course_completion(COURSE).await.unwrap();
        assert_eq!(completion, CourseCompletion { completed: 2, total: 4 });
        assert_eq!(completion.percent(), 50);
    }

    #[tokio::test]
    async fn totals_surface_store_errors() {
        let store = seeded().await;
        let svc = service(&store);
        store.fail_catalog.store(true, Ordering::SeqCst);
        assert!(svc.total_in_course(COURSE).await.is_err());
        assert!(svc.course_completion(COURSE).await.is_err());
    }

    #[test]
    fn completion_percent_handles_edges() {
        assert_eq!(CourseCompletion { completed: 0, total: 0 }.percent(), 0);
        assert_eq!(CourseCompletion { completed: 1, total: 3 }.percent(), 33);
        assert_eq!(CourseCompletion { completed: 5, total: 4 }.percent(), 100);
    }

    #[tokio::test]
    async fn last_accessed_course_tracks_latest_update() {
        let store = seeded().await;
        let svc = service(&store);
        svc.refresh().await;
        assert_eq!(svc.last_accessed_course(), None);

        let older = ProgressRecord::new_partial(
            UserId::new(1),
            CourseId::new(5),
            ModuleId::new(50),
            LessonId::new(501),
            pct(10),
            fixed_now(),
        );
        let newer = ProgressRecord::new_partial(
            UserId::new(1),
            CourseId::new(6),
            ModuleId::new(60),
            LessonId::new(601),
            pct(10),
            fixed_now() + chrono::Duration::hours(1),
        );
        store.inner.upsert_progress(&newer).await.unwrap();
        store.inner.upsert_progress(&older).await.unwrap();

        assert_eq!(svc.refresh().await, RefreshStatus::Loaded(2));
        assert_eq!(svc.last_accessed_course(), Some(CourseId::new(6)));
    }

    #[tokio::test]
    async fn next_lesson_walks_course_order() {
        let store = seeded().await;
        let svc = service(&store);

        let next = |lesson| svc.next_lesson(lesson);
        assert_eq!(next(L101).await.unwrap().map(|l| l.id()), Some(L102));
        assert_eq!(next(L102).await.unwrap().map(|l| l.id()), Some(L201));
        assert_eq!(next(L202).await.unwrap(), None);
        assert_eq!(next(LessonId::new(999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_during_refresh_drops_the_late_snapshot() {
        let store = seeded().await;
        let svc = Arc::new(service(&store));
        svc.mark_completed(COURSE, M1, L101).await.unwrap();
        *store.progress_read_delay.lock().unwrap() = Some(Duration::from_millis(100));

        let pending = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        svc.clear();

        assert_eq!(pending.await.unwrap(), RefreshStatus::Discarded);
        assert_eq!(svc.cache_status(), CacheStatus::Empty);
        assert!(!svc.is_completed(L101));
        assert!(svc.records().is_empty());

        // a refresh started after sign-out loads normally
        *store.progress_read_delay.lock().unwrap() = None;
        assert_eq!(svc.refresh().await, RefreshStatus::Loaded(1));
    }

    #[tokio::test]
    async fn clear_during_a_write_keeps_the_session_empty() {
        let store = seeded().await;
        let svc = Arc::new(service(&store));
        *store.progress_write_delay.lock().unwrap() = Some(Duration::from_millis(100));

        let pending = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.mark_completed(COURSE, M1, L101).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        svc.clear();

        pending.await.unwrap().unwrap();
        assert_eq!(svc.cache_status(), CacheStatus::Empty);
        assert!(!svc.is_completed(L101));

        // the row itself landed
        assert_eq!(svc.refresh().await, RefreshStatus::Loaded(1));
        assert!(svc.is_completed(L101));
    }

    #[tokio::test]
    async fn catalog_reads_are_bounded_by_the_store_timeout() {
        let store = seeded().await;
        *store.catalog_delay.lock().unwrap() = Some(Duration::from_secs(60));
        let svc = service(&store)
            .with_config(ProgressConfig::default().with_store_timeout(Duration::from_millis(20)));

        let timed_out = |err: ProgressServiceError| {
            matches!(err, ProgressServiceError::Storage(StorageError::Timeout(_)))
        };
        assert!(timed_out(svc.courses().await.unwrap_err()));
        assert!(timed_out(svc.course(COURSE).await.unwrap_err()));
        assert!(timed_out(svc.locate_lesson(L101).await.unwrap_err()));
        assert!(timed_out(svc.outline(COURSE).await.unwrap_err()));
    }

    #[tokio::test]
    async fn catalog_reads_resolve_lessons_and_outlines() {
        let store = seeded().await;
        let svc = service(&store);

        let (module, lesson) = svc.locate_lesson(L202).await.unwrap().unwrap();
        assert_eq!((module.id(), lesson.id()), (M2, L202));
        assert!(svc.locate_lesson(LessonId::new(999)).await.unwrap().is_none());

        let outline = svc.outline(COURSE).await.unwrap();
        assert_eq!(outline.total_lessons(), 4);
        let calls = store.catalog_calls.load(Ordering::SeqCst);
        svc.outline(COURSE).await.unwrap();
        assert_eq!(store.catalog_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn clear_discards_session_state() {
        let store = seeded().await;
        let svc = service(&store);
        svc.mark_completed(COURSE, M1, L101).await.unwrap();

        svc.clear();
        assert_eq!(svc.cache_status(), CacheStatus::Empty);
        assert!(!svc.is_completed(L101));
        assert!(svc.records().is_empty());
    }
}
