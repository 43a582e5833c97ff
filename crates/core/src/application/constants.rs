// Probe and scheduling constants (no magic values)
use std::time::Duration;

/// Echo requests sent by the reachability probe (count-bounded so ping terminates)
pub const PING_COUNT: u32 = 3;

/// Grepable-output marker for a host that answered discovery
pub const HOST_UP_MARKER: &str = "Status: Up";

/// Grepable-output marker for an open TCP port
pub const OPEN_PORT_MARKER: &str = "/open/tcp//";

/// Pause between two cycles of the daemon loop (90s)
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(90);

/// Default SSH port of the vantage host
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default staging file for the CSV report (tilde expanded)
pub const DEFAULT_REPORT_PATH: &str = "~/netmon.csv";

/// Fixed report columns, in order
pub const REPORT_COLUMNS: [&str; 5] = ["host", "returncode", "observation_point", "name", "time"];
