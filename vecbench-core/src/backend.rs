use async_trait::async_trait;

use crate::config::{BackendKind, TargetDescriptor};
use crate::error::Result;
use crate::types::{PointBatch, PointId, SearchParams, SearchResults};

/// Distance metric a collection is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Distance {
    #[default]
    Cosine,
}

/// Everything needed to create a collection if it is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

/// How point ids are derived from a row's position in the input files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// Integer ids counting from 1
    OneBasedNumeric,
    /// String ids equal to the 0-based row offset
    ZeroBasedText,
}

impl IdScheme {
    pub fn id_for(&self, offset: usize) -> PointId {
        match self {
            IdScheme::OneBasedNumeric => PointId::Num(offset as u64 + 1),
            IdScheme::ZeroBasedText => PointId::Text(offset.to_string()),
        }
    }
}

/// Capabilities advertised by a backend
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Number of points sent per upsert call unless a target overrides it
    pub batch_size: usize,
    pub id_scheme: IdScheme,
}

/// Trait for vector database backends
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Human-readable name for this backend instance
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Establish connection to the database
    async fn connect(&mut self) -> Result<()>;

    /// Close connection gracefully
    async fn disconnect(&mut self) -> Result<()>;

    /// Create the collection unless it already exists, then select it
    async fn ensure_collection(&mut self, spec: &CollectionSpec) -> Result<()>;

    /// Select an existing collection, failing if it is absent
    async fn open_collection(&mut self, name: &str) -> Result<()>;

    /// Insert or replace a batch of points in the selected collection
    async fn upsert_batch(&self, batch: PointBatch) -> Result<()>;

    /// Execute a vector similarity search against the selected collection
    async fn query(&self, vector: &[f32], params: &SearchParams) -> Result<SearchResults>;
}

/// Builds a backend for a target whose kind has already been resolved
pub trait BackendFactory: Send + Sync {
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn VectorBackend>>;
}

impl<F> BackendFactory for F
where
    F: Fn(BackendKind, &TargetDescriptor) -> Result<Box<dyn VectorBackend>> + Send + Sync,
{
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn VectorBackend>> {
        self(kind, target)
    }
}
