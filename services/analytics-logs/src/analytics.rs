//! Entry points for enumerating analytics logs.

use crate::blob_iter::{LogBlobIterator, LogQuery};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::model::{LogListOptions, StorageService};
use crate::record_iter::LogRecordIterator;
use crate::store::{ListOptions, LogStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Client for the analytics logs held in one log container.
#[derive(Clone)]
pub struct AnalyticsClient {
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsClient {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different time source for the "not in the future" bound.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lazily enumerate the log blobs of `service` between `start` and `end`.
    ///
    /// Invalid options are rejected here, before any listing call is made.
    #[instrument(skip(self, options))]
    pub fn list_log_blobs(
        &self,
        service: StorageService,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        options: LogListOptions,
    ) -> Result<LogBlobIterator> {
        let (log_types, include_metadata) = options.resolve()?;
        debug!(?log_types, include_metadata, "Starting log blob enumeration");

        let query = LogQuery {
            service,
            start,
            end,
            log_types,
            list_options: ListOptions {
                recursive: true,
                include_metadata,
                max_results: options.request.max_results,
                timeout: options.request.timeout,
            },
        };
        Ok(LogBlobIterator::new(
            self.store.clone(),
            self.clock.clone(),
            query,
        ))
    }

    /// Lazily enumerate the parsed records of every matching log blob.
    pub fn list_log_records(
        &self,
        service: StorageService,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        options: LogListOptions,
    ) -> Result<LogRecordIterator> {
        let blobs = self.list_log_blobs(service, start, end, options)?;
        Ok(LogRecordIterator::new(self.store.clone(), blobs))
    }
}
