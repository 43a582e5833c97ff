// Port Layer - Interfaces for external dependencies

pub mod command_executor;
pub mod id_provider; // For deterministic testing
pub mod report_sink;
pub mod session;
pub mod time_provider;

// Re-exports
pub use command_executor::{tokenize, CommandExecutor, ExecutionError};
pub use id_provider::IdProvider;
pub use report_sink::ReportSink;
pub use session::{ConnectionError, SessionConnector};
pub use time_provider::TimeProvider;
