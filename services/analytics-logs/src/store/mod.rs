//! Object storage seam used by the log iterators.
//!
//! The iterators only need two things from storage: listing blobs under a
//! prefix and opening a blob for reading. [`LogStore`] captures that contract;
//! [`S3LogStore`] implements it against S3 and [`MemoryLogStore`] keeps blobs
//! in process.

mod memory;
mod s3;

pub use memory::MemoryLogStore;
pub use s3::S3LogStore;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncBufRead;

/// Metadata key carrying the operation categories logged in a blob.
pub const LOG_TYPE_METADATA_KEY: &str = "LogType";

/// Readable byte stream of one blob.
pub type BlobStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Listing results, fetched page by page as the stream is polled.
pub type ListStream = BoxStream<'static, Result<ListItem>>;

/// Listing over items that are already in memory.
pub fn listing_from(items: Vec<ListItem>) -> ListStream {
    stream::iter(items.into_iter().map(Ok)).boxed()
}

/// A listed blob: its name inside the logs container and its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    name: String,
    metadata: HashMap<String, String>,
}

impl BlobHandle {
    pub fn new(name: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Virtual directory of the blob, including the trailing `/`.
    pub fn parent_prefix(&self) -> &str {
        match self.name.rfind('/') {
            Some(idx) => &self.name[..=idx],
            None => "",
        }
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Look up a metadata value, ignoring key case (S3 lowercases user metadata).
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The blob's `LogType` metadata, if it was listed with metadata.
    pub fn log_type(&self) -> Option<&str> {
        self.metadata_value(LOG_TYPE_METADATA_KEY)
    }
}

/// One entry of a listing result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    Blob(BlobHandle),
    /// A virtual directory, returned only by non-recursive listings
    Directory(String),
}

/// Parameters of a single listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// List every blob under the prefix instead of one directory level
    pub recursive: bool,
    /// Populate [`BlobHandle::metadata`]
    pub include_metadata: bool,
    /// Page size hint
    pub max_results: Option<i32>,
    /// Upper bound on the whole call
    pub timeout: Option<Duration>,
}

/// Listing and read access to the container holding analytics logs.
///
/// Failures are reported as [`Error::Service`](crate::Error::Service).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogStore: Send + Sync {
    /// List items whose names start with `prefix`, in lexicographic order.
    ///
    /// No request is made until the stream is polled. Later pages, and any
    /// per-item metadata, are fetched only as items are pulled.
    fn list_blobs(&self, prefix: &str, options: &ListOptions) -> ListStream;

    /// Open a blob for reading.
    async fn open(&self, blob: &BlobHandle) -> Result<BlobStream>;
}
