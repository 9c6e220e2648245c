//! Flattens log blobs into a sequence of log records.

use crate::blob_iter::LogBlobIterator;
use crate::error::{Error, Result};
use crate::reader::DelimitedRecordReader;
use crate::record::LogRecord;
use crate::store::{BlobStream, LogStore};
use futures::Stream;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Closed,
    Failed,
}

/// Yields the records of every blob a [`LogBlobIterator`] produces.
///
/// Records come out blob by blob, in the order they were written. At most one
/// blob stream is open at a time; it is released before the next blob is
/// opened, when the enumeration fails, on [`close`](Self::close) and on drop.
pub struct LogRecordIterator {
    store: Arc<dyn LogStore>,
    blobs: LogBlobIterator,
    reader: Option<DelimitedRecordReader<BlobStream>>,
    pending: Option<LogRecord>,
    state: State,
}

impl LogRecordIterator {
    pub fn new(store: Arc<dyn LogStore>, blobs: LogBlobIterator) -> Self {
        Self {
            store,
            blobs,
            reader: None,
            pending: None,
            state: State::Active,
        }
    }

    /// Whether another record is available. Repeated calls do not advance.
    pub async fn has_next(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.state {
            State::Closed => return Ok(false),
            State::Failed => return Err(Error::Aborted),
            State::Active => {}
        }

        match self.fill_pending().await {
            Ok(found) => Ok(found),
            Err(e) => {
                self.state = State::Failed;
                self.reader = None;
                Err(e)
            }
        }
    }

    /// Next record, or `None` once every blob has been read.
    pub async fn next(&mut self) -> Result<Option<LogRecord>> {
        if self.has_next().await? {
            Ok(self.pending.take())
        } else {
            Ok(None)
        }
    }

    /// Release the open blob stream and end the enumeration. Safe to repeat.
    pub fn close(&mut self) {
        self.reader = None;
        self.pending = None;
        if self.state == State::Active {
            self.state = State::Closed;
        }
    }

    /// Whether a blob stream is currently open.
    pub fn has_open_stream(&self) -> bool {
        self.reader.is_some()
    }

    /// Adapt the iterator into a stream of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<LogRecord>> {
        futures::stream::try_unfold(self, |mut records| async move {
            Ok::<_, Error>(records.next().await?.map(|record| (record, records)))
        })
    }

    async fn fill_pending(&mut self) -> Result<bool> {
        loop {
            if let Some(reader) = self.reader.as_mut() {
                if !reader.is_end_of_file().await? {
                    let record = LogRecord::read(reader).await?;
                    metrics::counter!("analytics_logs.records.parsed").increment(1);
                    self.pending = Some(record);
                    return Ok(true);
                }
            }

            // Release the drained stream before opening the next one
            self.reader = None;

            match self.blobs.next().await? {
                Some(blob) => {
                    debug!(blob = blob.name(), "Opening log blob");
                    let stream = self.store.open(&blob).await?;
                    self.reader = Some(DelimitedRecordReader::new(stream));
                }
                None => return Ok(false),
            }
        }
    }
}
