use clap::{Args, Parser, Subcommand};
use learn_core::model::{CourseId, LessonId, UserId};

#[derive(Parser, Debug)]
#[command(name = "learn", version, about = "Course progress and lesson unlocking")]
pub struct Cli {
    /// SQLite database URL or file path
    #[arg(long = "db", env = "LEARN_DB_URL", default_value = "sqlite://learn.sqlite3", global = true)]
    pub db_url: String,

    /// Learner whose progress is read and written
    #[arg(long = "user", env = "LEARN_USER_ID", default_value = "1", global = true)]
    pub user_id: UserId,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert (or overwrite) the demo course catalog
    Seed,
    /// List courses with completion
    Courses,
    /// Show a course map with lock state per lesson
    Show(CourseArgs),
    /// Mark a lesson completed
    Complete(LessonArgs),
    /// Raise watch/read progress on a lesson
    Progress(ProgressArgs),
    /// Print the lesson that follows the given one
    Next(LessonArgs),
    /// Print the course the learner touched last
    Resume,
}

#[derive(Args, Debug)]
pub struct CourseArgs {
    pub course: CourseId,
}

#[derive(Args, Debug)]
pub struct LessonArgs {
    pub lesson: LessonId,
}

#[derive(Args, Debug)]
pub struct ProgressArgs {
    pub lesson: LessonId,
    /// Percentage between 0 and 100
    pub percent: u8,
}
