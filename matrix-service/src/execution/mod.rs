// Execution Engine Module
// Bounded-concurrency leaf scheduling and progress events

pub mod events;
pub mod scheduler;

// Re-export key types
pub use events::{progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender};
pub use scheduler::{RunHandle, RunReport, Scheduler};
