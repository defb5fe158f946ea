pub mod config;
pub mod error;
pub mod log;

// Expression model, scheduling and transport
pub mod core;
pub mod orchestration;
pub mod server;

pub use config::Config;
pub use core::{ExpressionId, ExpressionStatus, ExpressionView, Operator, Task, TaskId};
pub use error::{Error, Result};
pub use orchestration::{Orchestrator, Scheduler, WorkerPool};
