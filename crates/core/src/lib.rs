#![forbid(unsafe_code)]

pub mod model;
pub mod outline;
pub mod time;

pub use outline::{CourseOutline, OutlineError, OutlineModule, Prerequisite};
pub use time::Clock;
