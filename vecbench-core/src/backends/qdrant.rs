use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance as QdrantDistance, PointId as QdrantPointId, PointStruct,
    Query, QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload as QdrantPayload, Qdrant};
use tracing::debug;

use crate::backend::{Capabilities, CollectionSpec, Distance, IdScheme, VectorBackend};
use crate::config::TargetDescriptor;
use crate::error::{Error, Result};
use crate::types::{PointBatch, PointId, SearchParams, SearchResult, SearchResults};

pub struct QdrantBackend {
    target: TargetDescriptor,
    client: Option<Qdrant>,
    collection: Option<String>,
}

impl QdrantBackend {
    pub fn new(target: TargetDescriptor) -> Self {
        Self {
            target,
            client: None,
            collection: None,
        }
    }

    fn client(&self) -> Result<&Qdrant> {
        self.client.as_ref().ok_or(Error::NotConnected)
    }

    fn collection(&self) -> Result<&str> {
        self.collection
            .as_deref()
            .ok_or_else(|| Error::Collection("no collection selected".into()))
    }
}

/// The collection-management subset of the client
#[async_trait]
trait CollectionAdmin: Send + Sync {
    async fn has_collection(&self, name: &str) -> Result<bool>;
    async fn create(&self, spec: &CollectionSpec) -> Result<()>;
}

#[async_trait]
impl CollectionAdmin for Qdrant {
    async fn has_collection(&self, name: &str) -> Result<bool> {
        self.collection_exists(name)
            .await
            .map_err(|e| Error::Collection(e.to_string()))
    }

    async fn create(&self, spec: &CollectionSpec) -> Result<()> {
        let distance = match spec.distance {
            Distance::Cosine => QdrantDistance::Cosine,
        };
        self.create_collection(
            CreateCollectionBuilder::new(spec.name.as_str())
                .vectors_config(VectorParamsBuilder::new(spec.dimension as u64, distance)),
        )
        .await
        .map_err(|e| Error::Collection(e.to_string()))?;
        Ok(())
    }
}

/// Returns whether the collection had to be created
async fn create_if_absent(admin: &dyn CollectionAdmin, spec: &CollectionSpec) -> Result<bool> {
    if admin.has_collection(&spec.name).await? {
        debug!(collection = %spec.name, "Collection already exists");
        return Ok(false);
    }

    admin.create(spec).await?;
    debug!(collection = %spec.name, dimension = spec.dimension, "Created collection");
    Ok(true)
}

fn to_qdrant_id(id: PointId) -> QdrantPointId {
    match id {
        PointId::Num(n) => n.into(),
        PointId::Text(s) => s.into(),
    }
}

fn from_qdrant_id(id: Option<QdrantPointId>) -> String {
    match id {
        Some(QdrantPointId {
            point_id_options: Some(id),
        }) => match id {
            PointIdOptions::Num(n) => n.to_string(),
            PointIdOptions::Uuid(s) => s,
        },
        _ => "unknown".to_string(),
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            batch_size: 1,
            id_scheme: IdScheme::OneBasedNumeric,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let mut builder = Qdrant::from_url(&self.target.url);
        if let Some(key) = &self.target.api_key {
            builder = builder.api_key(key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        client
            .health_check()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        debug!(url = %self.target.url, "Connected to Qdrant");
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        self.collection = None;
        Ok(())
    }

    async fn ensure_collection(&mut self, spec: &CollectionSpec) -> Result<()> {
        create_if_absent(self.client()?, spec).await?;
        self.collection = Some(spec.name.clone());
        Ok(())
    }

    async fn open_collection(&mut self, name: &str) -> Result<()> {
        if !self.client()?.has_collection(name).await? {
            return Err(Error::Collection(format!("Collection '{}' not found", name)));
        }

        self.collection = Some(name.to_string());
        Ok(())
    }

    async fn upsert_batch(&self, batch: PointBatch) -> Result<()> {
        let client = self.client()?;
        let collection = self.collection()?;

        let points = batch
            .ids
            .into_iter()
            .zip(batch.vectors)
            .zip(batch.payloads)
            .map(|((id, vector), payload)| -> Result<PointStruct> {
                let payload = QdrantPayload::try_from(serde_json::Value::Object(payload))
                    .map_err(|e| Error::Upsert(e.to_string()))?;
                Ok(PointStruct::new(to_qdrant_id(id), vector, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| Error::Upsert(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], params: &SearchParams) -> Result<SearchResults> {
        let client = self.client()?;
        let collection = self.collection()?;

        let request = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(vector.to_vec()))
            .limit(params.top_k as u64);

        let response = client
            .query(request)
            .await
            .map_err(|e| Error::QueryExecution(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .map(|point| SearchResult {
                id: from_qdrant_id(point.id),
                score: point.score,
            })
            .collect();

        Ok(SearchResults::new(results))
    }
}
