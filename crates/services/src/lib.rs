#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod progress;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use config::ProgressConfig;
pub use error::{AppServicesError, ProgressServiceError};
pub use progress::{
    CacheStatus, CourseCompletion, ProgressCache, ProgressService, RefreshStatus, WriteOutcome,
};
