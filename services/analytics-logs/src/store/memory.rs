use super::{listing_from, BlobHandle, BlobStream, ListItem, ListOptions, ListStream, LogStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::{PoisonError, RwLock};

struct StoredBlob {
    data: Bytes,
    metadata: HashMap<String, String>,
}

/// In-process log container, ordered by blob name.
#[derive(Default)]
pub struct MemoryLogStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a blob.
    pub fn insert(
        &self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        metadata: HashMap<String, String>,
    ) {
        let blob = StoredBlob {
            data: data.into(),
            metadata,
        };
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), blob);
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    fn list_blobs(&self, prefix: &str, options: &ListOptions) -> ListStream {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let matching = blobs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix));

        let mut items = Vec::new();
        let mut directories = BTreeSet::new();
        for (name, blob) in matching {
            if !options.recursive {
                if let Some(idx) = name[prefix.len()..].find('/') {
                    let directory = &name[..prefix.len() + idx + 1];
                    if directories.insert(directory.to_string()) {
                        items.push(ListItem::Directory(directory.to_string()));
                    }
                    continue;
                }
            }
            let metadata = if options.include_metadata {
                blob.metadata.clone()
            } else {
                HashMap::new()
            };
            items.push(ListItem::Blob(BlobHandle::new(name.clone(), metadata)));
        }
        listing_from(items)
    }

    async fn open(&self, blob: &BlobHandle) -> Result<BlobStream> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let stored = blobs
            .get(blob.name())
            .ok_or_else(|| Error::Service(format!("blob not found: {}", blob.name())))?;
        Ok(Box::pin(Cursor::new(stored.data.clone())))
    }
}
