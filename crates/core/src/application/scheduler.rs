//! Cycle Scheduler - runs the full host × probe sweep on a fixed interval
//!
//! Each cycle builds a fresh batch and hands it to every report sink.
//! Shutdown is only observed between probes and during the sleep, so an
//! in-flight probe always runs to completion.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use super::runner::TaskRunner;
use super::shutdown::ShutdownToken;
use crate::domain::Batch;
use crate::port::ReportSink;

pub struct CycleScheduler {
    runner: Arc<TaskRunner>,
    sinks: Vec<Arc<dyn ReportSink>>,
    interval: Duration,
}

impl CycleScheduler {
    /// Create a new cycle scheduler
    ///
    /// # Arguments
    /// * `runner` - Task runner executed once per cycle
    /// * `sinks` - Report destinations, published in order
    /// * `interval` - Sleep between the end of one cycle and the start of the next
    pub fn new(
        runner: Arc<TaskRunner>,
        sinks: Vec<Arc<dyn ReportSink>>,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            sinks,
            interval,
        }
    }

    /// Run a single cycle and publish it
    pub async fn run_once(&self, shutdown: &ShutdownToken) -> Batch {
        let batch = self.runner.run_cycle(shutdown).await;
        self.publish(&batch);
        batch
    }

    /// Run cycles until shutdown is requested, returns the number of cycles run
    pub async fn run(&self, mut shutdown: ShutdownToken) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            hosts = self.runner.hosts().len(),
            sinks = self.sinks.len(),
            "Scheduler started"
        );

        let mut cycles = 0u64;
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let batch = self.run_once(&shutdown).await;
            cycles += 1;
            if batch.interrupted {
                info!("Cycle interrupted by shutdown");
                break;
            }

            tokio::select! {
                _ = sleep(self.interval) => {},
                _ = shutdown.wait() => {
                    info!("Scheduler interrupted during sleep");
                    break;
                }
            }
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }

    // Sink failures are logged; the next cycle still runs
    fn publish(&self, batch: &Batch) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(batch) {
                error!(batch_id = %batch.id, error = %e, "Failed to publish report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::ProbeDefinition;
    use crate::application::shutdown::shutdown_channel;
    use crate::domain::Platform;
    use crate::error::{AppError, Result};
    use crate::port::command_executor::mocks::MockCommandExecutor;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::report_sink::mocks::CollectingSink;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    struct BrokenSink;

    impl ReportSink for BrokenSink {
        fn publish(&self, _batch: &Batch) -> Result<()> {
            Err(AppError::Config("disk full".to_string()))
        }
    }

    fn runner() -> Arc<TaskRunner> {
        Arc::new(
            TaskRunner::new(
                vec!["localhost".into()],
                Arc::new(MockCommandExecutor::local()),
                Platform::Posix,
                Arc::new(FixedTimeProvider::at_secs(0)),
                Arc::new(SequentialIdProvider::default()),
            )
            .with_local_probes(vec![ProbeDefinition::reachability()]),
        )
    }

    #[tokio::test]
    async fn test_run_once_publishes_to_every_sink() {
        let collecting = Arc::new(CollectingSink::new());
        let scheduler = CycleScheduler::new(
            runner(),
            vec![Arc::new(BrokenSink), collecting.clone()],
            Duration::from_secs(90),
        );
        let (_tx, token) = shutdown_channel();

        let batch = scheduler.run_once(&token).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(collecting.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_cycle_gets_a_fresh_batch() {
        let collecting = Arc::new(CollectingSink::new());
        let scheduler = Arc::new(CycleScheduler::new(
            runner(),
            vec![collecting.clone()],
            Duration::from_secs(90),
        ));
        let (tx, token) = shutdown_channel();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run(token).await })
        };

        // Two full intervals elapse: three cycles start
        tokio::time::sleep(Duration::from_secs(200)).await;
        tx.shutdown();
        let cycles = handle.await.unwrap();

        assert_eq!(cycles, 3);
        let batches = collecting.batches();
        assert_eq!(batches.len(), 3);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.id, format!("batch-{}", i + 1));
            assert_eq!(batch.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_start_runs_nothing() {
        let collecting = Arc::new(CollectingSink::new());
        let scheduler =
            CycleScheduler::new(runner(), vec![collecting.clone()], Duration::from_secs(1));
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        assert_eq!(scheduler.run(token).await, 0);
        assert!(collecting.batches().is_empty());
    }
}
