//! Shared application state, wired once at startup and cloned per request.
use std::sync::Arc;

use crate::blob::{BlobReader, BlobWriter};
use crate::clock::Clock;
use crate::config::Config;
use crate::events::EventBus;
use crate::pipeline::PipelineEngine;
use crate::push::TenantAuthorizer;
use crate::store::MetadataStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub blob_reader: Arc<dyn BlobReader>,
    pub blob_writer: Arc<dyn BlobWriter>,
    pub bus: EventBus,
    pub pipeline: Arc<PipelineEngine>,
    pub clock: Arc<dyn Clock>,
    pub authorizer: Arc<dyn TenantAuthorizer>,
    pub config: Config,
}
