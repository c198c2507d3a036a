//! Blob storage boundary.
//!
//! `BlobReader` is a narrow random-access abstraction over wherever video
//! bytes actually live; the concrete object store is an external
//! collaborator out of scope for this crate. `InMemoryBlobStore` is the
//! reference implementation used by the binary and by tests.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, Result};

#[async_trait]
pub trait BlobReader: Send + Sync {
    /// Total size in bytes of the object behind `blob_ref`.
    async fn size(&self, blob_ref: &str) -> Result<u64>;
    /// Read `len` bytes starting at `offset`. Callers are responsible for
    /// clamping to `size()`; an out-of-range read is an internal error.
    async fn read(&self, blob_ref: &str, offset: u64, len: u64) -> Result<Bytes>;
}

/// Write-side boundary for intake. Kept separate from `BlobReader` so the
/// streaming path only ever depends on read access; the concrete object
/// store still backs both through the same implementation.
#[async_trait]
pub trait BlobWriter: Send + Sync {
    async fn put(&self, blob_ref: &str, data: Bytes) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, blob_ref: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .expect("blob store poisoned")
            .insert(blob_ref.into(), data.into());
    }
}

#[async_trait]
impl BlobReader for InMemoryBlobStore {
    async fn size(&self, blob_ref: &str) -> Result<u64> {
        let guard = self.objects.lock().expect("blob store poisoned");
        guard
            .get(blob_ref)
            .map(|b| b.len() as u64)
            .ok_or_else(|| AppError::NotFound(format!("blob {} not found", blob_ref)))
    }

    async fn read(&self, blob_ref: &str, offset: u64, len: u64) -> Result<Bytes> {
        let guard = self.objects.lock().expect("blob store poisoned");
        let object = guard
            .get(blob_ref)
            .ok_or_else(|| AppError::NotFound(format!("blob {} not found", blob_ref)))?;
        let start = offset as usize;
        let end = ((offset + len) as usize).min(object.len());
        if start > object.len() {
            return Err(AppError::Internal(format!(
                "read offset {} beyond blob size {}",
                offset,
                object.len()
            )));
        }
        Ok(object.slice(start..end))
    }
}

#[async_trait]
impl BlobWriter for InMemoryBlobStore {
    async fn put(&self, blob_ref: &str, data: Bytes) -> Result<()> {
        self.objects
            .lock()
            .expect("blob store poisoned")
            .insert(blob_ref.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn size_and_read_reflect_stored_bytes() {
        let store = InMemoryBlobStore::new();
        store.put("blob://a", Bytes::from_static(b"0123456789"));
        assert_eq!(store.size("blob://a").await.unwrap(), 10);
        let slice = store.read("blob://a", 2, 4).await.unwrap();
        assert_eq!(&slice[..], b"2345");
    }

    #[tokio::test]
    async fn read_clamps_past_end() {
        let store = InMemoryBlobStore::new();
        store.put("blob://a", Bytes::from_static(b"01234"));
        let slice = store.read("blob://a", 3, 100).await.unwrap();
        assert_eq!(&slice[..], b"34");
    }

    #[tokio::test]
    async fn unknown_blob_is_not_found() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.size("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn put_makes_blob_immediately_readable() {
        let store = InMemoryBlobStore::new();
        BlobWriter::put(&store, "blob://new", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.size("blob://new").await.unwrap(), 5);
        assert_eq!(&store.read("blob://new", 0, 5).await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn put_overwrites_existing_blob() {
        let store = InMemoryBlobStore::new();
        store.put("blob://x", Bytes::from_static(b"old-value"));
        BlobWriter::put(&store, "blob://x", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(store.size("blob://x").await.unwrap(), 3);
    }
}
