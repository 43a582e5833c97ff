// Report Sink Port
// Destination for the batch produced by each cycle

use crate::domain::Batch;
use crate::error::Result;

pub trait ReportSink: Send + Sync {
    /// Publish one batch
    fn publish(&self, batch: &Batch) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every published batch
    #[derive(Default)]
    pub struct CollectingSink {
        batches: Mutex<Vec<Batch>>,
    }

    impl CollectingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn batches(&self) -> Vec<Batch> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl ReportSink for CollectingSink {
        fn publish(&self, batch: &Batch) -> Result<()> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }
}
