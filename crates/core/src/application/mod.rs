// Application Layer - Probe catalog, cycle execution and reporting

pub mod catalog;
pub mod constants;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod shutdown;

// Re-exports
pub use catalog::{CustomProbe, ProbeDefinition, ProbeKind, SuccessRule};
pub use report::{ReportRow, Reporter};
pub use runner::{RemotePhase, TaskRunner};
pub use scheduler::CycleScheduler;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
