//! Daemon configuration
//!
//! Every option can be given on the command line or through the matching
//! `NETMON_*` environment variable.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use netmon_core::application::constants::{DEFAULT_REPORT_PATH, DEFAULT_SSH_PORT};
use netmon_core::application::{ProbeDefinition, ProbeKind};
use netmon_core::domain::{validate_host, Platform};
use netmon_infra_system::{HostKeyPolicy, SshConfig, SshCredential};

const DEFAULT_KNOWN_HOSTS: &str = "~/.ssh/known_hosts";

#[derive(Parser, Debug)]
#[command(name = "netmon")]
#[command(
    about = "Periodic ping and discovery probes, locally and from a remote vantage host",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub probes: ProbeArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one cycle and print the full batch as JSON
    Once,

    /// Run cycles forever, writing a CSV report after each one
    Daemon {
        /// Report file (tilde expanded)
        #[arg(long, env = "NETMON_REPORT_PATH", default_value = DEFAULT_REPORT_PATH)]
        report_path: String,

        /// Seconds to sleep between cycles
        #[arg(long, env = "NETMON_INTERVAL_SECS", default_value = "90")]
        interval_secs: u64,

        /// Also print each report to stdout
        #[arg(long)]
        stdout: bool,
    },
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Hosts to probe (comma separated)
    #[arg(
        long,
        global = true,
        env = "NETMON_HOSTS",
        value_delimiter = ',',
        default_value = "localhost"
    )]
    pub hosts: Vec<String>,

    /// Probes run from this machine (ping, scan)
    #[arg(
        long,
        global = true,
        env = "NETMON_LOCAL_PROBES",
        value_delimiter = ',',
        default_value = "ping,scan"
    )]
    pub local_probes: Vec<String>,

    /// Probes run on the vantage host (ping, scan)
    #[arg(
        long,
        global = true,
        env = "NETMON_REMOTE_PROBES",
        value_delimiter = ',',
        default_value = "ping,scan"
    )]
    pub remote_probes: Vec<String>,

    /// Extra flags for every ping
    #[arg(
        long,
        global = true,
        env = "NETMON_PING_OPTIONS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub ping_options: String,

    /// Extra flags for every scan
    #[arg(
        long,
        global = true,
        env = "NETMON_SCAN_OPTIONS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub scan_options: String,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Vantage host; remote probes are disabled when absent
    #[arg(long, global = true, env = "NETMON_REMOTE_HOST")]
    pub remote_host: Option<String>,

    #[arg(long, global = true, env = "NETMON_REMOTE_PORT", default_value_t = DEFAULT_SSH_PORT)]
    pub remote_port: u16,

    #[arg(long, global = true, env = "NETMON_REMOTE_USER")]
    pub remote_user: Option<String>,

    #[arg(long, global = true, env = "NETMON_REMOTE_PASSWORD", hide_env_values = true)]
    pub remote_password: Option<String>,

    /// Private key file, used instead of a password
    #[arg(long, global = true, env = "NETMON_REMOTE_KEY")]
    pub remote_key: Option<String>,

    #[arg(long, global = true, env = "NETMON_REMOTE_KEY_PASSPHRASE", hide_env_values = true)]
    pub remote_key_passphrase: Option<String>,

    /// Platform of the vantage host (posix, windows)
    #[arg(long, global = true, env = "NETMON_REMOTE_PLATFORM", default_value = "posix")]
    pub remote_platform: String,

    /// Unknown host keys: warn, auto-add or reject
    #[arg(long, global = true, env = "NETMON_HOST_KEY_POLICY", default_value = "warn")]
    pub host_key_policy: String,

    #[arg(long, global = true, env = "NETMON_KNOWN_HOSTS", default_value = DEFAULT_KNOWN_HOSTS)]
    pub known_hosts: String,

    #[arg(long, global = true, env = "NETMON_CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,
}

/// Validated remote settings
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub ssh: SshConfig,
    pub platform: Platform,
    pub probes: Vec<ProbeDefinition>,
}

/// Validated settings shared by both modes
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub hosts: Vec<String>,
    pub local_platform: Platform,
    pub local_probes: Vec<ProbeDefinition>,
    pub remote: Option<RemoteConfig>,
}

impl DaemonConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let hosts: Vec<String> = cli
            .probes
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if hosts.is_empty() {
            bail!("at least one host is required");
        }
        for host in &hosts {
            validate_host(host).context("invalid --hosts")?;
        }

        let local_probes = parse_probes(&cli.probes.local_probes, &cli.probes)
            .context("invalid --local-probes")?;

        let remote = match &cli.remote.remote_host {
            Some(host) => Some(remote_config(host, &cli.remote, &cli.probes)?),
            None => None,
        };

        Ok(Self {
            hosts,
            local_platform: Platform::host(),
            local_probes,
            remote,
        })
    }
}

fn remote_config(host: &str, args: &RemoteArgs, probe_args: &ProbeArgs) -> Result<RemoteConfig> {
    let user = args
        .remote_user
        .clone()
        .context("--remote-user is required with --remote-host")?;

    let credential = match (&args.remote_key, &args.remote_password) {
        (Some(key), _) => SshCredential::KeyFile {
            path: expand_path(key),
            passphrase: args.remote_key_passphrase.clone(),
        },
        (None, Some(password)) => SshCredential::Password(password.clone()),
        (None, None) => bail!("--remote-password or --remote-key is required with --remote-host"),
    };

    let platform: Platform = args
        .remote_platform
        .parse()
        .context("invalid --remote-platform")?;
    let host_key_policy: HostKeyPolicy = args
        .host_key_policy
        .parse()
        .map_err(anyhow::Error::msg)
        .context("invalid --host-key-policy")?;

    let mut ssh = SshConfig::new(host, user, credential);
    ssh.port = args.remote_port;
    ssh.host_key_policy = host_key_policy;
    ssh.known_hosts = Some(expand_path(&args.known_hosts));
    ssh.connect_timeout = Duration::from_secs(args.connect_timeout_secs.max(1));
    ssh.platform = platform;

    Ok(RemoteConfig {
        ssh,
        platform,
        probes: parse_probes(&probe_args.remote_probes, probe_args)
            .context("invalid --remote-probes")?,
    })
}

fn parse_probes(names: &[String], args: &ProbeArgs) -> Result<Vec<ProbeDefinition>> {
    let mut probes = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let kind: ProbeKind = name.parse()?;
        let options = match kind {
            ProbeKind::Reachability => args.ping_options.as_str(),
            ProbeKind::Discovery => args.scan_options.as_str(),
            ProbeKind::Custom(_) => "",
        };
        probes.push(ProbeDefinition::new(kind).with_options(options));
    }
    Ok(probes)
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Interval for daemon mode; zero is rejected
pub fn cycle_interval(interval_secs: u64) -> Result<Duration> {
    if interval_secs == 0 {
        bail!("--interval-secs must be greater than zero");
    }
    Ok(Duration::from_secs(interval_secs))
}
