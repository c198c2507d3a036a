//! Metadata persistence boundary.
//!
//! `MetadataStore` is the narrow trait the core depends on; the concrete
//! CRUD/transaction implementation is an external collaborator out of scope
//! for this crate. `InMemoryMetadataStore` is the reference implementation
//! used by the binary and by tests.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Video;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, video: Video) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Video>>;
    /// Apply `mutate` to the stored video for `id`, persisting the result.
    /// The store is responsible for the single-writer-per-video guarantee
    /// only insofar as callers respect it; see the pipeline's active-job set.
    async fn update(
        &self,
        id: Uuid,
        mutate: Box<dyn FnOnce(&mut Video) + Send>,
    ) -> Result<Video>;
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Video>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    videos: Mutex<HashMap<Uuid, Video>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, video: Video) -> Result<()> {
        let mut guard = self.videos.lock().expect("metadata store poisoned");
        guard.insert(video.id, video);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Video>> {
        let guard = self.videos.lock().expect("metadata store poisoned");
        Ok(guard.get(&id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        mutate: Box<dyn FnOnce(&mut Video) + Send>,
    ) -> Result<Video> {
        let mut guard = self.videos.lock().expect("metadata store poisoned");
        let video = guard
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("video {} not found", id)))?;
        mutate(video);
        Ok(video.clone())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Video>> {
        let guard = self.videos.lock().expect("metadata store poisoned");
        Ok(guard
            .values()
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut guard = self.videos.lock().expect("metadata store poisoned");
        guard.remove(&id);
        Ok(())
    }
}
