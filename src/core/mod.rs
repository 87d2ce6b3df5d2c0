pub mod classifier;
pub mod definition;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod orchestrator;
pub mod registry;
pub mod schedule;
pub mod scheduler;

pub use models::{ActionResult, RunInfo, ScriptJob};
pub use monitor::CompletionMonitor;
pub use orchestrator::Orchestrator;
pub use registry::{JobRegistry, JobState};
pub use schedule::{Schedule, describe, next_occurrence};
pub use scheduler::ScriptScheduler;
