// SSH executor for the vantage host
// reason: ssh2 (libssh2) is blocking, every call runs on tokio's blocking pool
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use netmon_core::application::constants::DEFAULT_SSH_PORT;
use netmon_core::domain::{CommandOutput, ObservationPoint, Platform, SIGNALED};
use netmon_core::port::{
    tokenize, CommandExecutor, ConnectionError, ExecutionError, SessionConnector,
};

use crate::host_key::{self, HostKeyPolicy};

/// How to authenticate to the vantage host
#[derive(Clone)]
pub enum SshCredential {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

// Secrets never reach the logs
impl std::fmt::Debug for SshCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshCredential::Password(_) => f.write_str("Password(***)"),
            SshCredential::KeyFile { path, .. } => {
                f.debug_struct("KeyFile").field("path", path).finish_non_exhaustive()
            }
        }
    }
}

/// Vantage host connection settings
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: SshCredential,
    pub host_key_policy: HostKeyPolicy,
    pub known_hosts: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Shell dialect of the vantage host
    pub platform: Platform,
}

impl SshConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        credential: SshCredential,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            credential,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
            connect_timeout: Duration::from_secs(10),
            platform: Platform::Posix,
        }
    }
}

/// Opens [`SshSession`]s to one vantage host
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(&self) -> Result<Arc<dyn CommandExecutor>, ConnectionError> {
        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || open_session(&config))
            .await
            .map_err(|e| ConnectionError::Session(e.to_string()))??;

        info!(
            vantage = %self.config.host,
            port = self.config.port,
            user = %self.config.user,
            "SSH session established"
        );

        Ok(Arc::new(SshSession::new(
            self.config.host.clone(),
            self.config.platform,
            session,
        )))
    }

    fn vantage(&self) -> &str {
        &self.config.host
    }
}

fn open_session(config: &SshConfig) -> Result<Session, ConnectionError> {
    let addr_label = format!("{}:{}", config.host, config.port);
    let tcp_error = |reason: String| ConnectionError::Tcp {
        addr: addr_label.clone(),
        reason,
    };

    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| tcp_error(e.to_string()))?
        .next()
        .ok_or_else(|| tcp_error("no address resolved".to_string()))?;
    let tcp = TcpStream::connect_timeout(&addr, config.connect_timeout)
        .map_err(|e| tcp_error(e.to_string()))?;

    let mut session = Session::new().map_err(|e| ConnectionError::Session(e.to_string()))?;
    session.set_tcp_stream(tcp);
    // Bounds the banner exchange and auth; cleared once the session is up
    session.set_timeout(timeout_millis(config.connect_timeout));
    session
        .handshake()
        .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

    host_key::verify(
        &session,
        &config.host,
        config.port,
        config.host_key_policy,
        config.known_hosts.as_deref(),
    )?;

    let auth_error = |reason: String| ConnectionError::Auth {
        user: config.user.clone(),
        reason,
    };
    match &config.credential {
        SshCredential::Password(password) => session
            .userauth_password(&config.user, password)
            .map_err(|e| auth_error(e.to_string()))?,
        SshCredential::KeyFile { path, passphrase } => session
            .userauth_pubkey_file(&config.user, None, path, passphrase.as_deref())
            .map_err(|e| auth_error(e.to_string()))?,
    }
    if !session.authenticated() {
        return Err(auth_error("server did not accept credentials".to_string()));
    }

    // Probes run as long as they need
    session.set_timeout(0);
    Ok(session)
}

/// libssh2 timeout in milliseconds; 0 means none, so round up to at least 1
fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

/// One authenticated session, shared by every remote probe
///
/// Commands are serialized on the session mutex; concurrent callers wait
/// their turn instead of interleaving on the channel.
pub struct SshSession {
    vantage: String,
    platform: Platform,
    session: Arc<Mutex<Session>>,
}

impl SshSession {
    pub fn new(vantage: impl Into<String>, platform: Platform, session: Session) -> Self {
        Self {
            vantage: vantage.into(),
            platform,
            session: Arc::new(Mutex::new(session)),
        }
    }
}

/// Command line the vantage shell will split back into exactly `args`
///
/// POSIX shells get `shell_words` quoting. cmd.exe has no quoting that is
/// safe for every program, so on Windows only arguments that need no
/// quoting at all are accepted.
pub fn remote_command_line(args: &[String], platform: Platform) -> Result<String, ExecutionError> {
    match platform {
        Platform::Posix => Ok(shell_words::join(args)),
        Platform::Windows => {
            if let Some(arg) = args.iter().find(|a| !is_plain_windows_arg(a)) {
                return Err(ExecutionError::RemoteQuoting(format!("{:?}", arg)));
            }
            Ok(args.join(" "))
        }
    }
}

fn is_plain_windows_arg(arg: &str) -> bool {
    !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '.' | '_' | '-' | ':' | '/' | '\\' | ',' | '=' | '+' | '@')
        })
}

#[async_trait]
impl CommandExecutor for SshSession {
    async fn execute(&self, command_line: &str) -> Result<CommandOutput, ExecutionError> {
        let args = tokenize(command_line)?;
        let remote_line = remote_command_line(&args, self.platform)?;
        let session = Arc::clone(&self.session);

        info!(vantage = %self.vantage, args = ?args, "Starting remote command");

        let (exit_status, stdout) = tokio::task::spawn_blocking(move || {
            let session = session
                .lock()
                .map_err(|_| ExecutionError::Channel("session lock poisoned".to_string()))?;
            run_remote(&session, &remote_line)
        })
        .await
        .map_err(|e| ExecutionError::Channel(e.to_string()))??;

        info!(
            vantage = %self.vantage,
            program = %args[0],
            exit_status,
            stdout_bytes = stdout.len(),
            "Remote command completed"
        );

        Ok(CommandOutput {
            exit_status,
            stdout,
            args,
        })
    }

    fn observation_point(&self) -> ObservationPoint {
        ObservationPoint::RemoteExec
    }

    fn vantage(&self) -> Option<&str> {
        Some(&self.vantage)
    }
}

fn channel_error(e: impl std::fmt::Display) -> ExecutionError {
    ExecutionError::Channel(e.to_string())
}

fn run_remote(session: &Session, command_line: &str) -> Result<(i32, Vec<u8>), ExecutionError> {
    let mut channel = session.channel_session().map_err(channel_error)?;
    channel.exec(command_line).map_err(channel_error)?;

    let mut stdout = Vec::new();
    channel
        .read_to_end(&mut stdout)
        .map_err(channel_error)?;

    let mut stderr = String::new();
    if channel.stderr().read_to_string(&mut stderr).is_ok() && !stderr.trim().is_empty() {
        debug!(stderr = %stderr.trim(), "Remote command wrote to stderr");
    }

    channel.wait_close().map_err(channel_error)?;
    // exit_status() reads 0 when the server sent exit-signal instead
    let signal = channel.exit_signal().map_err(channel_error)?;
    let exit_status = channel.exit_status().map_err(channel_error)?;

    Ok((remote_exit_code(exit_status, signal.exit_signal.as_deref()), stdout))
}

fn remote_exit_code(exit_status: i32, exit_signal: Option<&str>) -> i32 {
    match exit_signal {
        Some(signal) => {
            debug!(signal = %signal, "Remote command killed by signal");
            SIGNALED
        }
        None => exit_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SshConfig {
        SshConfig::new("127.0.0.1", "netmon", SshCredential::Password("n3tm0n".into()))
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.port, 22);
        assert_eq!(config.platform, Platform::Posix);
        assert_eq!(config.host_key_policy, HostKeyPolicy::Warn);
        assert!(config.known_hosts.is_none());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("n3tm0n"));
        assert!(debug.contains("Password(***)"));

        let key = SshCredential::KeyFile {
            path: PathBuf::from("/home/netmon/.ssh/id_ed25519"),
            passphrase: Some("secret".into()),
        };
        let debug = format!("{:?}", key);
        assert!(debug.contains("id_ed25519"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_vantage_is_connection_error() {
        // Port 1 on localhost is closed on any sane test machine
        let mut config = config();
        config.port = 1;
        config.connect_timeout = Duration::from_secs(2);
        let connector = SshConnector::new(config);

        assert_eq!(connector.vantage(), "127.0.0.1");
        match connector.connect().await {
            Err(ConnectionError::Tcp { addr, .. }) => assert_eq!(addr, "127.0.0.1:1"),
            Err(other) => panic!("expected tcp error, got {:?}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }

    #[test]
    fn test_posix_line_is_requoted() {
        let args = tokenize("nmap -oG - 'host name' \"it's\" '$HOME'").unwrap();
        let line = remote_command_line(&args, Platform::Posix).unwrap();
        assert_eq!(shell_words::split(&line).unwrap(), args);
    }

    #[test]
    fn test_windows_line_refuses_metacharacters() {
        let args = tokenize("ping -n 3 10.0.0.1").unwrap();
        assert_eq!(
            remote_command_line(&args, Platform::Windows).unwrap(),
            "ping -n 3 10.0.0.1"
        );

        for hostile in ["x & calc.exe", "a|b", "%COMSPEC%", "^", "\"q\"", "(x)", ""] {
            let args = vec!["ping".to_string(), hostile.to_string()];
            assert!(matches!(
                remote_command_line(&args, Platform::Windows),
                Err(ExecutionError::RemoteQuoting(_))
            ));
        }
    }

    #[test]
    fn test_signal_overrides_exit_status() {
        assert_eq!(remote_exit_code(0, Some("KILL")), SIGNALED);
        assert_eq!(remote_exit_code(0, None), 0);
        assert_eq!(remote_exit_code(3, None), 3);
    }

    #[test]
    fn test_timeout_millis_never_zero() {
        assert_eq!(timeout_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(timeout_millis(Duration::ZERO), 1);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[tokio::test]
    async fn test_silent_server_times_out_in_handshake() {
        // Accepts TCP, never sends an SSH banner
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_secs(5));
                drop(stream);
            }
        });

        let mut config = config();
        config.port = port;
        config.connect_timeout = Duration::from_millis(500);
        let connector = SshConnector::new(config);

        let result = tokio::time::timeout(Duration::from_secs(4), connector.connect()).await;
        match result {
            Ok(Err(ConnectionError::Handshake(_))) => {}
            Ok(Err(other)) => panic!("expected handshake error, got {:?}", other),
            Ok(Ok(_)) => panic!("handshake succeeded against a silent server"),
            Err(_) => panic!("handshake did not honor the connect timeout"),
        }
    }
}
