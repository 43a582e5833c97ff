//! Task Runner - one cycle of hosts × probes
//!
//! Local phase: every host, every local probe, on the local backend.
//! Remote phase: every host, every remote probe, on the single shared
//! session to the vantage host. The loop host is the probe target and the
//! vantage only relays the command.
//!
//! Execution is strictly sequential; each probe is awaited before the next starts.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::catalog::ProbeDefinition;
use super::shutdown::ShutdownToken;
use crate::domain::{Batch, PendingObservation, Platform, SkippedProbe};
use crate::port::{tokenize, CommandExecutor, IdProvider, SessionConnector, TimeProvider};

/// Remote probes and how to reach the vantage host
pub struct RemotePhase {
    connector: Arc<dyn SessionConnector>,
    platform: Platform,
    probes: Vec<ProbeDefinition>,
}

impl RemotePhase {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        platform: Platform,
        probes: Vec<ProbeDefinition>,
    ) -> Self {
        Self {
            connector,
            platform,
            probes,
        }
    }
}

enum ProbeOutcome {
    Recorded,
    Skipped,
    SessionLost(String),
}

pub struct TaskRunner {
    hosts: Vec<String>,
    local: Arc<dyn CommandExecutor>,
    local_platform: Platform,
    local_probes: Vec<ProbeDefinition>,
    remote: Option<RemotePhase>,
    // Kept across cycles, dropped when the session breaks
    session: Mutex<Option<Arc<dyn CommandExecutor>>>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl TaskRunner {
    pub fn new(
        hosts: Vec<String>,
        local: Arc<dyn CommandExecutor>,
        local_platform: Platform,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            hosts,
            local,
            local_platform,
            local_probes: Vec::new(),
            remote: None,
            session: Mutex::new(None),
            time_provider,
            id_provider,
        }
    }

    pub fn with_local_probes(mut self, probes: Vec<ProbeDefinition>) -> Self {
        self.local_probes = probes;
        self
    }

    pub fn with_remote(mut self, remote: RemotePhase) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Run every probe once and return a fresh batch
    ///
    /// Never fails: probe errors become failed observations and a broken
    /// remote session is recorded in `Batch::remote_error`.
    pub async fn run_cycle(&self, shutdown: &ShutdownToken) -> Batch {
        let mut batch = Batch::new(self.id_provider.generate_id(), self.time_provider.now());

        info!(
            batch_id = %batch.id,
            hosts = self.hosts.len(),
            local_probes = self.local_probes.len(),
            remote_probes = self.remote.as_ref().map_or(0, |r| r.probes.len()),
            "Cycle started"
        );

        let completed = self.run_local_phase(&mut batch, shutdown).await
            && self.run_remote_phase(&mut batch, shutdown).await;
        batch.interrupted = !completed;

        info!(
            batch_id = %batch.id,
            observations = batch.len(),
            failures = batch.failures().len(),
            skipped = batch.skipped.len(),
            interrupted = batch.interrupted,
            "Cycle finished"
        );

        batch
    }

    /// Returns false if shutdown stopped the phase early
    async fn run_local_phase(&self, batch: &mut Batch, shutdown: &ShutdownToken) -> bool {
        for host in &self.hosts {
            for probe in &self.local_probes {
                if shutdown.is_shutdown() {
                    return false;
                }
                self.run_probe(self.local.as_ref(), probe, host, self.local_platform, batch)
                    .await;
            }
        }
        true
    }

    /// Returns false if shutdown stopped the phase early
    async fn run_remote_phase(&self, batch: &mut Batch, shutdown: &ShutdownToken) -> bool {
        let Some(remote) = &self.remote else {
            return true;
        };
        if remote.probes.is_empty() || self.hosts.is_empty() {
            return true;
        }
        if shutdown.is_shutdown() {
            return false;
        }

        let session = match self.session_for(remote).await {
            Ok(session) => session,
            Err(reason) => {
                batch.remote_error = Some(reason);
                return true;
            }
        };

        for host in &self.hosts {
            for probe in &remote.probes {
                if shutdown.is_shutdown() {
                    return false;
                }
                let outcome = self
                    .run_probe(session.as_ref(), probe, host, remote.platform, batch)
                    .await;
                if let ProbeOutcome::SessionLost(reason) = outcome {
                    warn!(
                        vantage = %remote.connector.vantage(),
                        error = %reason,
                        "Remote session lost, abandoning remote phase for this cycle"
                    );
                    *self.session.lock().await = None;
                    batch.remote_error = Some(reason);
                    return true;
                }
            }
        }
        true
    }

    /// Reuse the cached session or open a new one
    async fn session_for(&self, remote: &RemotePhase) -> Result<Arc<dyn CommandExecutor>, String> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok(Arc::clone(session));
        }

        info!(vantage = %remote.connector.vantage(), "Connecting to vantage host");
        match remote.connector.connect().await {
            Ok(session) => {
                *cached = Some(Arc::clone(&session));
                Ok(session)
            }
            Err(e) => {
                warn!(
                    vantage = %remote.connector.vantage(),
                    error = %e,
                    "Connection failed, skipping remote probes this cycle"
                );
                Err(e.to_string())
            }
        }
    }

    async fn run_probe(
        &self,
        executor: &dyn CommandExecutor,
        probe: &ProbeDefinition,
        host: &str,
        platform: Platform,
        batch: &mut Batch,
    ) -> ProbeOutcome {
        let point = executor.observation_point();

        let mut pending =
            PendingObservation::new(probe.name(), host, point).with_platform(platform);
        if let Some(vantage) = executor.vantage() {
            pending = pending.with_vantage(vantage);
        }

        let command = match probe.command(host, platform) {
            Ok(command) => command,
            Err(e) => {
                warn!(probe = %probe.name(), host = %host, error = %e, "Refusing to build command");
                batch.push(pending.fail(&e, self.time_provider.now()));
                return ProbeOutcome::Recorded;
            }
        };
        let Some(command) = command else {
            debug!(
                probe = %probe.name(),
                host = %host,
                platform = %platform,
                "No command for platform, skipping probe"
            );
            batch.skipped.push(SkippedProbe {
                name: probe.name().to_string(),
                host: host.to_string(),
                observation_point: point,
                platform,
            });
            return ProbeOutcome::Skipped;
        };

        if let Ok(args) = tokenize(&command) {
            pending = pending.with_args(args);
        }

        match executor.execute(&command).await {
            Ok(output) => {
                let completed = pending.complete(output, self.time_provider.now());
                let observation = probe.evaluate(completed);
                info!(
                    probe = %observation.name(),
                    host = %observation.host(),
                    observation_point = %point,
                    returncode = observation.returncode(),
                    "Probe completed"
                );
                batch.push(observation);
                ProbeOutcome::Recorded
            }
            Err(e) => {
                warn!(
                    probe = %probe.name(),
                    host = %host,
                    observation_point = %point,
                    error = %e,
                    "Probe could not be executed"
                );
                batch.push(pending.fail(&e, self.time_provider.now()));
                if e.is_session_fatal() {
                    ProbeOutcome::SessionLost(e.to_string())
                } else {
                    ProbeOutcome::Recorded
                }
            }
        }
    }
}
