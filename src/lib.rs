pub mod config;
pub mod consequences;
pub mod logging;
pub mod memory;

// Tracing targets
pub const ENGINE_NAME: &str = "filter_consequences";
pub const EXECUTOR_TARGET: &str = "filter_consequences::executor";
pub const LOOKUP_TARGET: &str = "filter_consequences::lookup";
pub const ERROR_TARGET: &str = "filter_consequences::error";
pub const CONSOLE_TARGET: &str = "filter_consequences";

pub use config::EngineConfig;
pub use consequences::{
    ConsequenceError, ConsequenceResult, ConsequencesExecutor, ConsequencesExecutorFactory,
    ConsequencesReverter, ExecutionStatus,
};
