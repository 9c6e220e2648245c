//! Lazy enumeration of log blobs over a time window.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{LogTypeFilter, StorageService};
use crate::prefix::{parse_hour_prefix, PrefixCursor};
use crate::store::{BlobHandle, ListItem, ListOptions, ListStream, LogStore};
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, trace};

/// What to enumerate: a service's logs within an optional time window.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub service: StorageService,
    /// Inclusive start; the enumeration begins at the start of its hour
    pub start: Option<DateTime<Utc>>,
    /// Inclusive end
    pub end: Option<DateTime<Utc>>,
    pub log_types: LogTypeFilter,
    /// Options for every listing call; `recursive` is always forced on
    pub list_options: ListOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unstarted,
    Listing,
    Exhausted,
    Failed,
}

/// Enumerates the log blobs of one query in chronological order.
///
/// Each listing call covers one cursor position (see [`PrefixCursor`]).
/// Blobs are yielded lazily; a listing is only issued once the previous one
/// has been drained. The enumeration stops when a blob lies past the end
/// hour, when the cursor moves past the end bound or more than an hour into
/// the future, or after the single unbounded listing when there is no start.
///
/// Any failure ends the enumeration; later pulls return [`Error::Aborted`].
pub struct LogBlobIterator {
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
    directory: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    filter: LogTypeFilter,
    list_options: ListOptions,
    cursor: PrefixCursor,
    listing: Option<ListStream>,
    pending: Option<BlobHandle>,
    state: State,
}

impl LogBlobIterator {
    pub fn new(store: Arc<dyn LogStore>, clock: Arc<dyn Clock>, query: LogQuery) -> Self {
        let list_options = ListOptions {
            recursive: true,
            ..query.list_options
        };
        Self {
            store,
            clock,
            directory: query.service.log_directory(),
            start: query.start,
            end: query.end,
            filter: query.log_types,
            list_options,
            cursor: PrefixCursor::Unset,
            listing: None,
            pending: None,
            state: State::Unstarted,
        }
    }

    /// Current cursor position.
    pub fn cursor(&self) -> PrefixCursor {
        self.cursor
    }

    /// Whether another blob is available. Repeated calls do not advance.
    pub async fn has_next(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.state {
            State::Exhausted => return Ok(false),
            State::Failed => return Err(Error::Aborted),
            State::Unstarted => self.state = State::Listing,
            State::Listing => {}
        }

        match self.fill_pending().await {
            Ok(found) => Ok(found),
            Err(e) => {
                self.state = State::Failed;
                self.listing = None;
                Err(e)
            }
        }
    }

    /// Next matching blob, or `None` once the enumeration is over.
    pub async fn next(&mut self) -> Result<Option<BlobHandle>> {
        if self.has_next().await? {
            Ok(self.pending.take())
        } else {
            Ok(None)
        }
    }

    /// Adapt the iterator into a stream of blobs.
    pub fn into_stream(self) -> impl Stream<Item = Result<BlobHandle>> {
        futures::stream::try_unfold(self, |mut blobs| async move {
            Ok::<_, Error>(blobs.next().await?.map(|blob| (blob, blobs)))
        })
    }

    async fn fill_pending(&mut self) -> Result<bool> {
        while self.state == State::Listing {
            let Some(listing) = self.listing.as_mut() else {
                self.open_next_listing();
                continue;
            };
            let blob = match listing.try_next().await? {
                Some(ListItem::Blob(blob)) => blob,
                Some(ListItem::Directory(_)) => continue,
                None => {
                    self.open_next_listing();
                    continue;
                }
            };

            if let Some(end) = self.end {
                match parse_hour_prefix(&self.directory, blob.parent_prefix()) {
                    Some(hour) if hour > end => {
                        debug!(blob = blob.name(), "Reached end of time window");
                        self.expire();
                        return Ok(false);
                    }
                    Some(_) => {}
                    None => {
                        debug!(blob = blob.name(), "Skipping blob outside the log layout");
                        metrics::counter!("analytics_logs.blobs.skipped").increment(1);
                        continue;
                    }
                }
            }

            if self.is_correct_log_type(&blob) {
                metrics::counter!("analytics_logs.blobs.listed").increment(1);
                self.pending = Some(blob);
                return Ok(true);
            }

            trace!(blob = blob.name(), log_type = ?blob.log_type(), "Filtered out by log type");
            metrics::counter!("analytics_logs.blobs.skipped").increment(1);
        }

        Ok(false)
    }

    /// Advance the cursor and open its listing, or expire if nothing more can match.
    ///
    /// The listing makes no request until it is first pulled.
    fn open_next_listing(&mut self) {
        self.listing = None;

        let Some(next) = self.cursor.advance(self.start) else {
            self.expire();
            return;
        };

        if let Some(span_start) = next.start() {
            let horizon = self.clock.now() + Duration::hours(1);
            let past_end = self.end.is_some_and(|end| span_start > end);
            if span_start > horizon || past_end {
                debug!(cursor = %next.path(), "Cursor moved past the time window");
                self.expire();
                return;
            }
        }

        self.cursor = next;
        let prefix = format!("{}{}", self.directory, next.path());
        debug!(prefix = %prefix, "Listing log blobs");

        self.listing = Some(self.store.list_blobs(&prefix, &self.list_options));
        metrics::counter!("analytics_logs.listings").increment(1);
    }

    /// Blobs without `LogType` metadata cannot be filtered and are kept.
    fn is_correct_log_type(&self, blob: &BlobHandle) -> bool {
        match blob.log_type() {
            Some(value) => self.filter.accepts_metadata_value(value),
            None => true,
        }
    }

    fn expire(&mut self) {
        self.state = State::Exhausted;
        self.listing = None;
    }
}
