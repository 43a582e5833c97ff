//! NetMon - Main Entry Point
//! Probes every host locally and from the vantage host, once or on an interval

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use netmon_core::application::{
    shutdown_channel, CycleScheduler, RemotePhase, Reporter, ShutdownSender, TaskRunner,
};
use netmon_core::port::id_provider::UuidProvider;
use netmon_core::port::time_provider::SystemTimeProvider;
use netmon_core::port::ReportSink;
use netmon_infra_system::{FileReportSink, LocalExecutor, SshConnector};

use config::{cycle_interval, expand_path, Cli, Commands, DaemonConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging (guard flushes the optional log file on exit)
    let _log_guard = logging::init()?;

    info!("NetMon v{} starting...", netmon_core::VERSION);

    // 2. Configuration
    let config = DaemonConfig::from_cli(&cli)?;
    info!(
        hosts = ?config.hosts,
        local_platform = %config.local_platform,
        local_probes = config.local_probes.len(),
        remote = config.remote.as_ref().map(|r| r.ssh.host.as_str()).unwrap_or("disabled"),
        "Configuration loaded"
    );

    // 3. Wiring
    let runner = Arc::new(build_runner(config));
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    match cli.command {
        Commands::Once => {
            let scheduler = CycleScheduler::new(runner, Vec::new(), std::time::Duration::ZERO);
            let signal_task = tokio::spawn(forward_ctrl_c(shutdown_tx));

            let batch = scheduler.run_once(&shutdown_rx).await;
            signal_task.abort();

            println!("{}", Reporter::to_json(&batch).context("Failed to encode batch")?);
        }
        Commands::Daemon {
            report_path,
            interval_secs,
            stdout,
        } => {
            let interval = cycle_interval(interval_secs)?;
            let report_path = expand_path(&report_path);
            info!(path = %report_path.display(), "Report file");

            let sinks: Vec<Arc<dyn ReportSink>> =
                vec![Arc::new(FileReportSink::new(report_path, stdout))];
            let scheduler = CycleScheduler::new(runner, sinks, interval);

            let scheduler_handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

            info!("Press Ctrl+C to shutdown");
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received. Finishing the current probe...");
            shutdown_tx.shutdown();

            let cycles = scheduler_handle
                .await
                .context("Scheduler task failed")?;
            info!(cycles, "Shutdown complete.");
        }
    }

    Ok(())
}

fn build_runner(config: DaemonConfig) -> TaskRunner {
    let time_provider = Arc::new(SystemTimeProvider);
    let local = Arc::new(LocalExecutor::new(time_provider.clone()));

    let runner = TaskRunner::new(
        config.hosts,
        local,
        config.local_platform,
        time_provider,
        Arc::new(UuidProvider),
    )
    .with_local_probes(config.local_probes);

    match config.remote {
        Some(remote) => runner.with_remote(RemotePhase::new(
            Arc::new(SshConnector::new(remote.ssh)),
            remote.platform,
            remote.probes,
        )),
        None => runner,
    }
}

async fn forward_ctrl_c(shutdown_tx: ShutdownSender) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received. Finishing the current probe...");
            shutdown_tx.shutdown();
        }
        Err(e) => warn!(error = %e, "Could not listen for Ctrl+C"),
    }
}
