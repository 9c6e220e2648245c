use super::{BlobHandle, BlobStream, ListItem, ListOptions, ListStream, LogStore};
use crate::config::S3Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::Client as S3Client;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Log container backed by an S3 bucket.
///
/// Blob names are object keys. S3 returns no user metadata from listings, so
/// metadata is fetched with one `HeadObject` per blob, and only when the
/// listing asks for it.
#[derive(Clone)]
pub struct S3LogStore {
    client: S3Client,
    bucket: String,
}

impl S3LogStore {
    /// Create a store for the configured bucket
    pub async fn new(config: &S3Config) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 log store initialized"
        );

        Ok(Self::from_client(client, config.bucket.clone()))
    }

    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head_metadata(&self, key: &str) -> Result<HashMap<String, String>> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::Service(format!(
                    "failed to fetch metadata of {key:?}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(head.metadata().cloned().unwrap_or_default())
    }
}

/// Entry of a fetched page whose metadata has not been requested yet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageEntry {
    Object(String),
    Directory(String),
}

impl PageEntry {
    fn name(&self) -> &str {
        match self {
            PageEntry::Object(key) | PageEntry::Directory(key) => key,
        }
    }
}

/// Walks `ListObjectsV2` pages, requesting the next page only once the
/// buffered entries are used up.
struct PageCursor {
    store: S3LogStore,
    prefix: String,
    options: ListOptions,
    continuation: Option<String>,
    last_page: bool,
    buffered: VecDeque<PageEntry>,
}

impl PageCursor {
    fn new(store: S3LogStore, prefix: &str, options: &ListOptions) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            options: options.clone(),
            continuation: None,
            last_page: false,
            buffered: VecDeque::new(),
        }
    }

    async fn next_item(&mut self) -> Result<Option<ListItem>> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                let item = match entry {
                    PageEntry::Directory(dir) => ListItem::Directory(dir),
                    PageEntry::Object(key) => {
                        let metadata = if self.options.include_metadata {
                            with_timeout(self.options.timeout, self.store.head_metadata(&key))
                                .await??
                        } else {
                            HashMap::new()
                        };
                        ListItem::Blob(BlobHandle::new(key, metadata))
                    }
                };
                return Ok(Some(item));
            }

            if self.last_page {
                return Ok(None);
            }
            let page = with_timeout(self.options.timeout, self.fetch_page()).await??;
            self.continuation = page.next_continuation_token().map(str::to_string);
            self.last_page = !page.is_truncated().unwrap_or(false) || self.continuation.is_none();
            self.buffer_page(&page);
        }
    }

    async fn fetch_page(&self) -> Result<ListObjectsV2Output> {
        self.store
            .client
            .list_objects_v2()
            .bucket(&self.store.bucket)
            .prefix(&self.prefix)
            .set_delimiter((!self.options.recursive).then(|| "/".to_string()))
            .set_max_keys(self.options.max_results)
            .set_continuation_token(self.continuation.clone())
            .send()
            .await
            .map_err(|e| {
                Error::Service(format!(
                    "failed to list {:?}: {}",
                    self.prefix,
                    DisplayErrorContext(&e)
                ))
            })
    }

    fn buffer_page(&mut self, page: &ListObjectsV2Output) {
        let mut entries: Vec<PageEntry> = page
            .common_prefixes()
            .iter()
            .filter_map(|common| common.prefix())
            .map(|dir| PageEntry::Directory(dir.to_string()))
            .chain(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(|key| PageEntry::Object(key.to_string())),
            )
            .collect();

        // Directories and objects arrive as separate lists per page
        if !self.options.recursive {
            entries.sort_by(|a, b| a.name().cmp(b.name()));
        }

        debug!(prefix = %self.prefix, entries = entries.len(), "Fetched listing page");
        self.buffered.extend(entries);
    }
}

#[async_trait]
impl LogStore for S3LogStore {
    fn list_blobs(&self, prefix: &str, options: &ListOptions) -> ListStream {
        debug!(bucket = %self.bucket, prefix, "Listing log blobs");
        let cursor = PageCursor::new(self.clone(), prefix, options);
        futures::stream::try_unfold(cursor, |mut cursor| async move {
            Ok::<_, Error>(cursor.next_item().await?.map(|item| (item, cursor)))
        })
        .boxed()
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %blob.name()))]
    async fn open(&self, blob: &BlobHandle) -> Result<BlobStream> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(blob.name())
            .send()
            .await
            .map_err(|e| {
                Error::Service(format!(
                    "failed to open {:?}: {}",
                    blob.name(),
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(Box::pin(object.body.into_async_read()))
    }
}

async fn with_timeout<T>(timeout: Option<Duration>, call: impl Future<Output = T>) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| Error::Service(format!("S3 request timed out after {limit:?}"))),
        None => Ok(call.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> S3LogStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .build();
        S3LogStore::from_client(S3Client::from_conf(config), "storage-analytics")
    }

    #[test]
    fn test_page_buffering_sorts_non_recursive_entries() {
        let page = ListObjectsV2Output::builder()
            .common_prefixes(
                aws_sdk_s3::types::CommonPrefix::builder()
                    .prefix("blob/2023/03/13/11/")
                    .build(),
            )
            .contents(
                aws_sdk_s3::types::Object::builder()
                    .key("blob/2023/03/13/10.log")
                    .build(),
            )
            .contents(
                aws_sdk_s3::types::Object::builder()
                    .key("blob/2023/03/13/12.log")
                    .build(),
            )
            .build();

        let mut cursor = PageCursor::new(store(), "blob/2023/03/13/", &ListOptions::default());
        cursor.buffer_page(&page);
        let names: Vec<_> = cursor.buffered.iter().map(PageEntry::name).collect();
        assert_eq!(
            names,
            vec![
                "blob/2023/03/13/10.log",
                "blob/2023/03/13/11/",
                "blob/2023/03/13/12.log",
            ]
        );
    }

    #[tokio::test]
    async fn test_buffered_entries_are_served_without_requests() {
        let mut cursor = PageCursor::new(store(), "blob/", &ListOptions::default());
        cursor.last_page = true;
        cursor
            .buffered
            .push_back(PageEntry::Object("blob/2023/03/13/10/000000.log".to_string()));

        let item = cursor.next_item().await.unwrap();
        assert!(matches!(item, Some(ListItem::Blob(ref blob)) if blob.metadata().is_empty()));
        assert_eq!(cursor.next_item().await.unwrap(), None);
    }

    #[test]
    fn test_page_entry_name() {
        let object = PageEntry::Object("blob/2023/a.log".to_string());
        let dir = PageEntry::Directory("blob/2023/".to_string());
        assert_eq!(object.name(), "blob/2023/a.log");
        assert_eq!(dir.name(), "blob/2023/");
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Some(Duration::from_millis(10)),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;
        assert!(matches!(result, Err(Error::Service(_))));

        let result = with_timeout(None, async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
