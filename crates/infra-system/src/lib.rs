// NetMon Infrastructure - System Adapters
// Implements: CommandExecutor (local, SSH), SessionConnector, ReportSink

pub mod host_key;
pub mod local_executor;
pub mod report_file;
pub mod ssh_executor;

pub use host_key::HostKeyPolicy;
pub use local_executor::LocalExecutor;
pub use report_file::FileReportSink;
pub use ssh_executor::{remote_command_line, SshConfig, SshConnector, SshCredential, SshSession};
