//! Nier Analytics Logs
//!
//! Reads the Storage Analytics logs a storage account writes about its own
//! requests. Log blobs live under `<service>/yyyy/MM/dd/HH/` in a single log
//! container; each blob holds `;`-delimited, newline-terminated records.
//!
//! ## Features
//!
//! - **Lazy Blob Enumeration**: Lists one time prefix at a time, widening from
//!   hours to days, months and years as the window allows
//! - **Log Type Filtering**: Selects read, write or delete logs from blob
//!   metadata without opening the blobs
//! - **Record Parsing**: Streams version `1.0` records with typed fields
//! - **Pluggable Storage**: S3 for production, in-memory for tests
//!
//! ## Architecture
//!
//! ```text
//! AnalyticsClient
//!        │
//!        ▼
//! ┌──────────────┐  list   ┌──────────────┐
//! │ LogBlob      │────────▶│ LogStore     │
//! │ Iterator     │         │ (S3/memory)  │
//! └──────────────┘         └──────────────┘
//!        │                        │ open
//!        ▼                        ▼
//! ┌──────────────┐         ┌──────────────┐
//! │ LogRecord    │────────▶│ Delimited    │
//! │ Iterator     │         │ RecordReader │
//! └──────────────┘         └──────────────┘
//! ```

pub mod analytics;
pub mod blob_iter;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod prefix;
pub mod reader;
pub mod record;
pub mod record_iter;
pub mod store;

pub use analytics::AnalyticsClient;
pub use blob_iter::{LogBlobIterator, LogQuery};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{
    BlobListingDetail, LogListOptions, LogType, LogTypeFilter, RequestOptions, StorageService,
};
pub use reader::DelimitedRecordReader;
pub use record::LogRecord;
pub use record_iter::LogRecordIterator;
pub use store::{BlobHandle, ListItem, ListOptions, LogStore, MemoryLogStore, S3LogStore};
