use std::sync::Arc;

use learn_core::model::UserId;
use storage::repository::{CatalogRepository, CatalogWriter, Storage};

use crate::Clock;
use crate::config::ProgressConfig;
use crate::error::AppServicesError;
use crate::progress::ProgressService;

/// Storage plus the progress engine for one signed-in user.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Wire services over an already built `Storage`.
    #[must_use]
    pub fn new(storage: Storage, clock: Clock, user_id: UserId, config: ProgressConfig) -> Self {
        let progress = Arc::new(
            ProgressService::new(
                user_id,
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.progress),
            )
            .with_config(config),
        );
        Self { storage, progress }
    }

    /// Build services backed by `SQLite` storage and load the user's progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        user_id: UserId,
        config: ProgressConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let services = Self::new(storage, clock, user_id, config);
        services.progress.refresh().await;
        Ok(services)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn CatalogRepository> {
        Arc::clone(&self.storage.catalog)
    }

    #[must_use]
    pub fn catalog_writer(&self) -> Arc<dyn CatalogWriter> {
        Arc::clone(&self.storage.catalog_writer)
    }
}
