//! Catalog matching: attach an external catalog id/url to a track.

use async_trait::async_trait;
use fip_proto::model::{CatalogMatch, Track};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::EngineError;

/// External catalog lookup (e.g. a streaming service search endpoint).
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn search(&self, track: &Track) -> anyhow::Result<Option<CatalogMatch>>;
}

/// Resolves tracks against a `CatalogService`, folding failures into "no
/// match".  Cheap to clone; every clone shares the service.
#[derive(Clone)]
pub struct CatalogMatcher {
    service: Arc<dyn CatalogService>,
}

impl CatalogMatcher {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self { service }
    }

    pub async fn find(&self, track: &Track) -> Option<CatalogMatch> {
        match self.service.search(track).await {
            Ok(found) => {
                debug!("[catalog] {} → {:?}", track.id, found.as_ref().map(|m| &m.id));
                found
            }
            Err(e) => {
                warn!("[catalog] {}", EngineError::lookup(&track.id, &e));
                None
            }
        }
    }

    /// New track value carrying the match, or explicit nulls when there is none.
    pub async fn enrich(&self, track: Track) -> Track {
        match self.find(&track).await {
            Some(m) => track.with_catalog(Some(m.id), Some(m.url)),
            None => track.with_catalog(None, None),
        }
    }
}

/// Table-driven catalog keyed by track id.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: BTreeMap<String, CatalogMatch>,
}

impl StaticCatalog {
    pub fn new(entries: BTreeMap<String, CatalogMatch>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn search(&self, track: &Track) -> anyhow::Result<Option<CatalogMatch>> {
        Ok(self.entries.get(&track.id).cloned())
    }
}
