//! Probe Catalog - command lines and success rules for every probe kind
//!
//! - Reachability (`ping_host`): count-bounded echo requests, judged by exit status
//! - Discovery (`scan_host`): host discovery plus a fast port sweep, judged by output markers
//! - Custom: a named per-platform template, judged by exit status
//!
//! Hosts are validated (name/address characters only, no leading `-`) and
//! substituted as a single token. Options are substituted verbatim and may
//! carry several flags.

use std::str::FromStr;

use super::constants::{HOST_UP_MARKER, OPEN_PORT_MARKER, PING_COUNT};
use crate::domain::{validate_host, DomainError, Observation, Platform};

const REACHABILITY_NAME: &str = "ping_host";
const DISCOVERY_NAME: &str = "scan_host";

/// Discovery markers; any one present means the host is up
const DISCOVERY_MARKERS: &[&str] = &[HOST_UP_MARKER, OPEN_PORT_MARKER];

/// Ping with the platform's count flag
pub fn reachability_command(host: &str, options: &str, platform: Platform) -> Option<String> {
    let count_flag = match platform {
        Platform::Posix => "-c",
        Platform::Windows => "-n",
    };
    Some(format!(
        "ping {} {} {} {}",
        count_flag,
        PING_COUNT,
        options,
        shell_words::quote(host)
    ))
}

/// Unprivileged nmap discovery with grepable output on stdout
pub fn discovery_command(host: &str, options: &str, _platform: Platform) -> Option<String> {
    Some(format!(
        "nmap --unprivileged -T5 -nF --open -oG - {} {}",
        options,
        shell_words::quote(host)
    ))
}

/// How a completed observation is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessRule {
    /// Success iff the raw exit status is 0
    ExitStatus,
    /// Success iff normalized stdout contains any marker; the exit status is discarded
    AnyMarker(&'static [&'static str]),
}

impl SuccessRule {
    pub fn is_success(&self, exit_status: i32, stdout: &str) -> bool {
        match self {
            SuccessRule::ExitStatus => exit_status == 0,
            SuccessRule::AnyMarker(markers) => markers.iter().any(|m| stdout.contains(m)),
        }
    }

    /// Apply the rule to an executed observation
    pub fn apply(&self, observation: Observation) -> Observation {
        match self {
            SuccessRule::ExitStatus => observation,
            SuccessRule::AnyMarker(_) => {
                let verdict = if self.is_success(observation.returncode(), observation.stdout()) {
                    0
                } else {
                    1
                };
                observation.with_returncode(verdict)
            }
        }
    }
}

/// User-defined command probe
///
/// Templates may use `{host}` and `{options}`. A missing template means the
/// probe does not exist on that platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomProbe {
    pub name: String,
    pub posix: Option<String>,
    pub windows: Option<String>,
}

impl CustomProbe {
    pub fn template(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Posix => self.posix.as_deref(),
            Platform::Windows => self.windows.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeKind {
    Reachability,
    Discovery,
    Custom(CustomProbe),
}

impl ProbeKind {
    pub fn name(&self) -> &str {
        match self {
            ProbeKind::Reachability => REACHABILITY_NAME,
            ProbeKind::Discovery => DISCOVERY_NAME,
            ProbeKind::Custom(probe) => &probe.name,
        }
    }

    pub fn success_rule(&self) -> SuccessRule {
        match self {
            ProbeKind::Discovery => SuccessRule::AnyMarker(DISCOVERY_MARKERS),
            ProbeKind::Reachability | ProbeKind::Custom(_) => SuccessRule::ExitStatus,
        }
    }

    /// Command line for a host, or None if the kind has no variant for the platform
    ///
    /// # Errors
    /// DomainError::InvalidHost if the host is not a plain name or address
    pub fn command(
        &self,
        host: &str,
        options: &str,
        platform: Platform,
    ) -> Result<Option<String>, DomainError> {
        let host = validate_host(host)?;
        Ok(match self {
            ProbeKind::Reachability => reachability_command(host, options, platform),
            ProbeKind::Discovery => discovery_command(host, options, platform),
            ProbeKind::Custom(probe) => probe
                .template(platform)
                .map(|template| fill_template(template, &shell_words::quote(host), options)),
        })
    }
}

// Single pass: substituted text is never scanned again
fn fill_template(template: &str, host: &str, options: &str) -> String {
    let mut out = String::with_capacity(template.len() + host.len() + options.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{host}") {
            out.push_str(host);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{options}") {
            out.push_str(options);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

impl FromStr for ProbeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ping" | "reachability" | REACHABILITY_NAME => Ok(ProbeKind::Reachability),
            "scan" | "discovery" | DISCOVERY_NAME => Ok(ProbeKind::Discovery),
            other => Err(DomainError::InvalidProbe(other.to_string())),
        }
    }
}

/// A probe kind plus the extra options passed on every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDefinition {
    kind: ProbeKind,
    options: String,
}

impl ProbeDefinition {
    pub fn new(kind: ProbeKind) -> Self {
        Self {
            kind,
            options: String::new(),
        }
    }

    pub fn reachability() -> Self {
        Self::new(ProbeKind::Reachability)
    }

    pub fn discovery() -> Self {
        Self::new(ProbeKind::Discovery)
    }

    pub fn custom(probe: CustomProbe) -> Self {
        Self::new(ProbeKind::Custom(probe))
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn kind(&self) -> &ProbeKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn command(&self, host: &str, platform: Platform) -> Result<Option<String>, DomainError> {
        self.kind.command(host, &self.options, platform)
    }

    /// Judge an executed observation
    pub fn evaluate(&self, observation: Observation) -> Observation {
        self.kind.success_rule().apply(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommandOutput, ObservationPoint, PendingObservation};
    use crate::port::tokenize;
    use chrono::Utc;

    fn executed(code: i32, stdout: &str) -> Observation {
        PendingObservation::new("probe", "host", ObservationPoint::LocalExec).complete(
            CommandOutput {
                exit_status: code,
                stdout: stdout.as_bytes().to_vec(),
                args: vec!["probe".into()],
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_reachability_platform_flags() {
        let posix = ProbeDefinition::reachability()
            .command("localhost", Platform::Posix)
            .unwrap()
            .unwrap();
        let windows = ProbeDefinition::reachability()
            .command("localhost", Platform::Windows)
            .unwrap()
            .unwrap();

        assert_eq!(tokenize(&posix).unwrap(), ["ping", "-c", "3", "localhost"]);
        assert_eq!(tokenize(&windows).unwrap(), ["ping", "-n", "3", "localhost"]);
    }

    #[test]
    fn test_discovery_command_tokens() {
        let cmd = ProbeDefinition::discovery()
            .with_options("-p 22,80")
            .command("203.0.113.1", Platform::Posix)
            .unwrap()
            .unwrap();
        assert_eq!(
            tokenize(&cmd).unwrap(),
            [
                "nmap",
                "--unprivileged",
                "-T5",
                "-nF",
                "--open",
                "-oG",
                "-",
                "-p",
                "22,80",
                "203.0.113.1"
            ]
        );
    }

    #[test]
    fn test_hostile_hosts_rejected() {
        for host in ["example.com; rm -rf ~", "-oN/tmp/pwned", "x & calc.exe"] {
            for probe in [ProbeDefinition::reachability(), ProbeDefinition::discovery()] {
                for platform in [Platform::Posix, Platform::Windows] {
                    assert!(matches!(
                        probe.command(host, platform),
                        Err(DomainError::InvalidHost(_))
                    ));
                }
            }
        }
    }

    #[test]
    fn test_template_options_not_expanded_twice() {
        let probe = ProbeDefinition::custom(CustomProbe {
            name: "echo".to_string(),
            posix: Some("echo {options} {host} {other}".to_string()),
            windows: None,
        })
        .with_options("{host}");

        assert_eq!(
            probe.command("10.0.0.1", Platform::Posix).unwrap().as_deref(),
            Some("echo {host} 10.0.0.1 {other}")
        );
    }

    #[test]
    fn test_reachability_uses_exit_status_only() {
        let probe = ProbeDefinition::reachability();
        assert_eq!(probe.evaluate(executed(0, "")).returncode(), 0);
        assert_eq!(probe.evaluate(executed(1, "Status: Up")).returncode(), 1);
        assert_eq!(probe.evaluate(executed(2, "")).returncode(), 2);
    }

    #[test]
    fn test_discovery_ignores_exit_status() {
        let probe = ProbeDefinition::discovery();
        let up = "# Nmap 7.94Host: 127.0.0.1 ()\tStatus: Up# Nmap done";
        let open = "Host: 127.0.0.1 ()\tPorts: 22/open/tcp//ssh///";
        let down = "# Nmap 7.94# Nmap done: 1 IP address (0 hosts up)";

        assert_eq!(probe.evaluate(executed(0, up)).returncode(), 0);
        assert_eq!(probe.evaluate(executed(1, up)).returncode(), 0);
        assert_eq!(probe.evaluate(executed(3, open)).returncode(), 0);
        assert_eq!(probe.evaluate(executed(0, down)).returncode(), 1);
        assert_eq!(probe.evaluate(executed(0, "")).returncode(), 1);
    }

    #[test]
    fn test_custom_probe_missing_platform() {
        let probe = ProbeDefinition::custom(CustomProbe {
            name: "list_dir".to_string(),
            posix: Some("ls {options} -lA".to_string()),
            windows: None,
        })
        .with_options("-h");

        assert_eq!(probe.name(), "list_dir");
        assert_eq!(
            probe.command("ignored", Platform::Posix).unwrap().as_deref(),
            Some("ls -h -lA")
        );
        assert_eq!(probe.command("ignored", Platform::Windows), Ok(None));
        assert_eq!(probe.kind().success_rule(), SuccessRule::ExitStatus);
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("ping".parse::<ProbeKind>().unwrap(), ProbeKind::Reachability);
        assert_eq!("SCAN_HOST".parse::<ProbeKind>().unwrap(), ProbeKind::Discovery);
        assert!(matches!(
            "traceroute".parse::<ProbeKind>(),
            Err(DomainError::InvalidProbe(_))
        ));
    }
}
