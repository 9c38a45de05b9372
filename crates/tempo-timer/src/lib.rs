/*
[INPUT]:  Public API exports for tempo-timer crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod countdown;
pub mod cue;
pub mod display;
pub mod effects;
pub mod model;
pub mod orchestrator;
pub mod reducer;
pub mod storage;

// Re-export main types for convenience
pub use config::TimerConfig;
pub use countdown::{CountdownCoordinator, CountdownSnapshot};
pub use model::{Task, TaskKind, TaskState};
pub use orchestrator::{Orchestrator, TimerEvent};
pub use reducer::{TaskAction, reduce};
pub use storage::StateStorage;
