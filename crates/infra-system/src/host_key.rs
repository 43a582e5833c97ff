// Host key verification for the vantage session
// Default policy accepts unknown keys with a warning: only for controlled networks.
use ssh2::{CheckResult, KnownHostFileKind, KnownHostKeyFormat, Session};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use netmon_core::port::ConnectionError;

/// What to do with a host key that is not in known_hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Log and accept
    #[default]
    Warn,
    /// Accept and append to known_hosts
    AutoAdd,
    /// Refuse the connection
    Reject,
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Ok(HostKeyPolicy::Warn),
            "auto-add" | "auto_add" | "autoadd" => Ok(HostKeyPolicy::AutoAdd),
            "reject" => Ok(HostKeyPolicy::Reject),
            other => Err(format!("unknown host key policy: {}", other)),
        }
    }
}

/// Lookup result against known_hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownHostStatus {
    Match,
    Mismatch,
    NotFound,
}

impl From<CheckResult> for KnownHostStatus {
    fn from(result: CheckResult) -> Self {
        match result {
            CheckResult::Match => KnownHostStatus::Match,
            CheckResult::Mismatch => KnownHostStatus::Mismatch,
            // A failed lookup is treated like an unknown host
            CheckResult::NotFound | CheckResult::Failure => KnownHostStatus::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyDecision {
    Accept,
    AcceptAndRecord,
    Refuse(ConnectionError),
}

/// Apply the policy; a mismatching key is refused under every policy
pub fn decide(status: KnownHostStatus, policy: HostKeyPolicy, host: &str) -> HostKeyDecision {
    match (status, policy) {
        (KnownHostStatus::Match, _) => HostKeyDecision::Accept,
        (KnownHostStatus::Mismatch, _) => HostKeyDecision::Refuse(ConnectionError::HostKeyMismatch {
            host: host.to_string(),
        }),
        (KnownHostStatus::NotFound, HostKeyPolicy::Warn) => HostKeyDecision::Accept,
        (KnownHostStatus::NotFound, HostKeyPolicy::AutoAdd) => HostKeyDecision::AcceptAndRecord,
        (KnownHostStatus::NotFound, HostKeyPolicy::Reject) => {
            HostKeyDecision::Refuse(ConnectionError::HostKeyRejected {
                host: host.to_string(),
            })
        }
    }
}

/// Name a host is stored under in known_hosts
pub fn known_hosts_name(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_string()
    } else {
        format!("[{}]:{}", host, port)
    }
}

/// Check the session's host key after the handshake
pub fn verify(
    session: &Session,
    host: &str,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts_file: Option<&Path>,
) -> Result<(), ConnectionError> {
    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| ConnectionError::Handshake("server sent no host key".to_string()))?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| ConnectionError::Session(e.to_string()))?;

    if let Some(path) = known_hosts_file {
        if let Err(e) = known_hosts.read_file(path, KnownHostFileKind::OpenSSH) {
            debug!(path = %path.display(), error = %e, "Could not read known_hosts");
        }
    }

    let status = KnownHostStatus::from(known_hosts.check_port(host, port, key));
    match decide(status, policy, host) {
        HostKeyDecision::Accept => {
            if status == KnownHostStatus::NotFound {
                warn!(host = %host, port, "Unknown host key accepted (policy: warn)");
            }
            Ok(())
        }
        HostKeyDecision::AcceptAndRecord => {
            let name = known_hosts_name(host, port);
            known_hosts
                .add(&name, key, "added by netmon", KnownHostKeyFormat::from(key_type))
                .map_err(|e| ConnectionError::Session(e.to_string()))?;
            if let Some(path) = known_hosts_file {
                // The entry just added is the last one with this name
                let entry = known_hosts
                    .iter()
                    .map_err(|e| ConnectionError::Session(e.to_string()))?
                    .into_iter()
                    .rev()
                    .find(|h| h.name() == Some(name.as_str()))
                    .ok_or_else(|| ConnectionError::Session("added host key not found".into()))?;
                let line = known_hosts
                    .write_string(&entry, KnownHostFileKind::OpenSSH)
                    .map_err(|e| ConnectionError::Session(e.to_string()))?;
                append_line(path, &line).map_err(|e| {
                    ConnectionError::Session(format!("{}: {}", path.display(), e))
                })?;
            }
            info!(host = %name, "Unknown host key recorded in known_hosts");
            Ok(())
        }
        HostKeyDecision::Refuse(e) => Err(e),
    }
}

/// Append one entry, leaving existing lines and comments untouched
pub fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;

    let mut entry = String::new();
    if file.seek(SeekFrom::End(0))? > 0 {
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            entry.push('\n');
        }
    }
    entry.push_str(line.trim_end_matches('\n'));
    entry.push('\n');
    file.write_all(entry.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!("warn".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::Warn));
        assert_eq!("Auto-Add".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::AutoAdd));
        assert_eq!("reject".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::Reject));
        assert!("trust".parse::<HostKeyPolicy>().is_err());
        assert_eq!(HostKeyPolicy::default(), HostKeyPolicy::Warn);
    }

    #[test]
    fn test_unknown_key_per_policy() {
        let host = "192.0.2.10";
        assert_eq!(
            decide(KnownHostStatus::NotFound, HostKeyPolicy::Warn, host),
            HostKeyDecision::Accept
        );
        assert_eq!(
            decide(KnownHostStatus::NotFound, HostKeyPolicy::AutoAdd, host),
            HostKeyDecision::AcceptAndRecord
        );
        assert_eq!(
            decide(KnownHostStatus::NotFound, HostKeyPolicy::Reject, host),
            HostKeyDecision::Refuse(ConnectionError::HostKeyRejected {
                host: host.to_string()
            })
        );
    }

    #[test]
    fn test_mismatch_always_refused() {
        for policy in [HostKeyPolicy::Warn, HostKeyPolicy::AutoAdd, HostKeyPolicy::Reject] {
            assert!(matches!(
                decide(KnownHostStatus::Mismatch, policy, "h"),
                HostKeyDecision::Refuse(ConnectionError::HostKeyMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_lookup_failure_counts_as_unknown() {
        assert_eq!(
            KnownHostStatus::from(CheckResult::Failure),
            KnownHostStatus::NotFound
        );
        assert_eq!(KnownHostStatus::from(CheckResult::Match), KnownHostStatus::Match);
    }

    #[test]
    fn test_append_keeps_comments() {
        let dir = std::env::temp_dir().join(format!("netmon-known-hosts-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("known_hosts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "# my comment\nold ssh-ed25519 AAAA").unwrap();

        append_line(&path, "[vantage]:2222 ssh-ed25519 BBBB\n").unwrap();
        append_line(&path, "other ssh-rsa CCCC").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            concat!(
                "# my comment\n",
                "old ssh-ed25519 AAAA\n",
                "[vantage]:2222 ssh-ed25519 BBBB\n",
                "other ssh-rsa CCCC\n"
            )
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_append_creates_file() {
        let dir = std::env::temp_dir().join(format!("netmon-known-new-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join(".ssh").join("known_hosts");

        append_line(&path, "vantage ssh-ed25519 AAAA").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "vantage ssh-ed25519 AAAA\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_known_hosts_name() {
        assert_eq!(known_hosts_name("vantage", 22), "vantage");
        assert_eq!(known_hosts_name("vantage", 2222), "[vantage]:2222");
    }
}
