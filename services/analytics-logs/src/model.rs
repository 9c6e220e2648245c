//! Enumeration options and selectors shared by the iterators and the client.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Storage service whose analytics logs are enumerated.
///
/// The lowercase name is the virtual directory the service's logs live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageService {
    #[default]
    Blob,
    Queue,
    Table,
    File,
}

impl StorageService {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageService::Blob => "blob",
            StorageService::Queue => "queue",
            StorageService::Table => "table",
            StorageService::File => "file",
        }
    }

    /// Directory prefix of this service's logs, including the trailing `/`.
    pub fn log_directory(&self) -> String {
        format!("{}/", self.as_str())
    }
}

impl fmt::Display for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of storage operation recorded in a log blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Read,
    Write,
    Delete,
}

impl LogType {
    /// Substring of the `LogType` blob metadata value marking this category.
    pub fn metadata_marker(&self) -> &'static str {
        match self {
            LogType::Read => "read",
            LogType::Write => "write",
            LogType::Delete => "delete",
        }
    }
}

/// Set of log types an enumeration should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTypeFilter {
    read: bool,
    write: bool,
    delete: bool,
}

impl LogTypeFilter {
    /// Accept read, write and delete logs.
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
        }
    }

    /// Accept nothing. Only useful as a starting point for [`with`](Self::with).
    pub fn empty() -> Self {
        Self {
            read: false,
            write: false,
            delete: false,
        }
    }

    pub fn only(log_type: LogType) -> Self {
        Self::empty().with(log_type)
    }

    pub fn with(mut self, log_type: LogType) -> Self {
        match log_type {
            LogType::Read => self.read = true,
            LogType::Write => self.write = true,
            LogType::Delete => self.delete = true,
        }
        self
    }

    pub fn contains(&self, log_type: LogType) -> bool {
        match log_type {
            LogType::Read => self.read,
            LogType::Write => self.write,
            LogType::Delete => self.delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.read || self.write || self.delete)
    }

    pub fn is_all(&self) -> bool {
        self.read && self.write && self.delete
    }

    /// Whether a blob with the given `LogType` metadata value is wanted.
    ///
    /// A value naming none of the known categories is never accepted.
    pub fn accepts_metadata_value(&self, value: &str) -> bool {
        [LogType::Read, LogType::Write, LogType::Delete]
            .into_iter()
            .any(|log_type| self.contains(log_type) && value.contains(log_type.metadata_marker()))
    }
}

impl Default for LogTypeFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<LogType> for LogTypeFilter {
    fn from_iter<I: IntoIterator<Item = LogType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), LogTypeFilter::with)
    }
}

/// Extra data a blob listing may return alongside each blob.
///
/// Log enumeration only understands [`Metadata`](Self::Metadata); requesting
/// anything else is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobListingDetail {
    Metadata,
    Snapshots,
    UncommittedBlobs,
    Copy,
}

/// Options shaping each listing request sent to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Page size hint for listing calls
    pub max_results: Option<i32>,
    /// Upper bound on a single listing call
    pub timeout: Option<Duration>,
}

/// Caller options for a log enumeration.
#[derive(Debug, Clone, Default)]
pub struct LogListOptions {
    /// Operation categories to return; all categories when unset
    pub log_types: Option<LogTypeFilter>,
    /// Listing details to request; empty or `{Metadata}`
    pub details: BTreeSet<BlobListingDetail>,
    /// Request shaping forwarded to the store
    pub request: RequestOptions,
}

impl LogListOptions {
    pub fn with_log_types(mut self, log_types: LogTypeFilter) -> Self {
        self.log_types = Some(log_types);
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.details.insert(BlobListingDetail::Metadata);
        self
    }

    /// Resolve the effective filter and whether blob metadata must be listed.
    pub(crate) fn resolve(&self) -> Result<(LogTypeFilter, bool)> {
        let filter = self.log_types.unwrap_or_default();
        if filter.is_empty() {
            return Err(Error::Configuration(
                "at least one log type must be requested".to_string(),
            ));
        }

        if let Some(detail) = self
            .details
            .iter()
            .find(|detail| **detail != BlobListingDetail::Metadata)
        {
            return Err(Error::Configuration(format!(
                "listing detail {detail:?} is not supported for log blobs; use none or metadata"
            )));
        }

        let include_metadata =
            !filter.is_all() || self.details.contains(&BlobListingDetail::Metadata);
        Ok((filter, include_metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_matching_categories() {
        let filter = LogTypeFilter::only(LogType::Write);
        assert!(!filter.accepts_metadata_value("read"));
        assert!(filter.accepts_metadata_value("read,write"));
        assert!(filter.accepts_metadata_value("write"));
        assert!(!filter.accepts_metadata_value("delete"));
    }

    #[test]
    fn test_filter_rejects_unknown_category() {
        assert!(!LogTypeFilter::all().accepts_metadata_value("list"));
    }

    #[test]
    fn test_filter_from_iterator() {
        let filter: LogTypeFilter = [LogType::Read, LogType::Delete].into_iter().collect();
        assert!(filter.contains(LogType::Read));
        assert!(!filter.contains(LogType::Write));
        assert!(filter.contains(LogType::Delete));
        assert!(!filter.is_all());

        let none: LogTypeFilter = std::iter::empty().collect();
        assert!(none.is_empty());
    }

    #[test]
    fn test_resolve_defaults_to_all_without_metadata() {
        let (filter, include_metadata) = LogListOptions::default().resolve().unwrap();
        assert!(filter.is_all());
        assert!(!include_metadata);
    }

    #[test]
    fn test_resolve_requests_metadata_for_partial_filter() {
        let options = LogListOptions::default().with_log_types(LogTypeFilter::only(LogType::Read));
        let (_, include_metadata) = options.resolve().unwrap();
        assert!(include_metadata);

        let (_, include_metadata) = LogListOptions::default().with_metadata().resolve().unwrap();
        assert!(include_metadata);
    }

    #[test]
    fn test_resolve_rejects_invalid_options() {
        let options = LogListOptions::default().with_log_types(LogTypeFilter::empty());
        assert!(options.resolve().unwrap_err().is_configuration());

        let mut options = LogListOptions::default();
        options.details.insert(BlobListingDetail::Snapshots);
        assert!(options.resolve().unwrap_err().is_configuration());
    }

    #[test]
    fn test_service_directory() {
        assert_eq!(StorageService::Queue.log_directory(), "queue/");
        assert_eq!(
            serde_json::from_str::<StorageService>("\"table\"").unwrap(),
            StorageService::Table
        );
    }
}
