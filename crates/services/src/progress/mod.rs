mod cache;
mod locks;
mod outlines;
mod service;

#[cfg(test)]
mod test_support;

pub use cache::{CacheStatus, ProgressCache, RefreshStatus};
pub use service::{CourseCompletion, ProgressService, WriteOutcome};
