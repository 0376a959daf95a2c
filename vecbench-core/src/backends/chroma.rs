use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::backend::{Capabilities, CollectionSpec, Distance, IdScheme, VectorBackend};
use crate::config::TargetDescriptor;
use crate::error::{Error, Result};
use crate::types::{PointBatch, SearchParams, SearchResult, SearchResults};

/// Port assumed when `url` is a bare host
pub const DEFAULT_PORT: u16 = 8000;
pub const BATCH_SIZE: usize = 1000;

const DEFAULT_TENANT: &str = "default_tenant";
const DEFAULT_DATABASE: &str = "default_database";

#[derive(Debug, Clone, Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

/// Chroma over its v2 REST API
pub struct ChromaBackend {
    target: TargetDescriptor,
    base_url: Url,
    client: Option<Client>,
    collection: Option<ChromaCollection>,
}

impl ChromaBackend {
    pub fn new(target: TargetDescriptor) -> Result<Self> {
        let base_url = base_url(&target.url)?;
        Ok(Self {
            target,
            base_url,
            client: None,
            collection: None,
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::NotConnected)
    }

    fn collection(&self) -> Result<&ChromaCollection> {
        self.collection
            .as_ref()
            .ok_or_else(|| Error::Collection("no collection selected".into()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn collections_endpoint(&self) -> String {
        let tenant = self.target.tenant.as_deref().unwrap_or(DEFAULT_TENANT);
        let database = self.target.database.as_deref().unwrap_or(DEFAULT_DATABASE);
        self.endpoint(&format!("tenants/{tenant}/databases/{database}/collections"))
    }

    fn collection_endpoint(&self, action: &str) -> Result<String> {
        let collection = self.collection()?;
        Ok(format!(
            "{}/{}/{}",
            self.collections_endpoint(),
            collection.id,
            action
        ))
    }
}

/// Bare hosts get `http://` and the default port; full URLs are used as given
pub(crate) fn base_url(url: &str) -> Result<Url> {
    let has_scheme = url.contains("://");
    let candidate = if has_scheme {
        url.to_string()
    } else {
        format!("http://{url}")
    };

    let mut parsed = Url::parse(&candidate)
        .map_err(|e| Error::Config(format!("Invalid URL '{}': {}", url, e)))?;

    if !has_scheme && parsed.port().is_none() {
        parsed
            .set_port(Some(DEFAULT_PORT))
            .map_err(|_| Error::Config(format!("Invalid URL '{}': cannot set port", url)))?;
    }
    Ok(parsed)
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, fail: fn(String) -> Error) -> Result<T> {
    let response = request.send().await.map_err(|e| fail(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(fail(format!("{}: {}", status, body)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))
}

#[async_trait]
impl VectorBackend for ChromaBackend {
    fn name(&self) -> &str {
        "chroma"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            batch_size: BATCH_SIZE,
            id_scheme: IdScheme::ZeroBasedText,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let _: serde_json::Value =
            send(client.get(self.endpoint("heartbeat")), Error::Connection).await?;

        debug!(url = %self.base_url, "Connected to Chroma");
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        self.collection = None;
        Ok(())
    }

    async fn ensure_collection(&mut self, spec: &CollectionSpec) -> Result<()> {
        let space = match spec.distance {
            Distance::Cosine => "cosine",
        };
        let body = json!({
            "name": spec.name,
            "configuration": {
                "hnsw": { "space": space }
            },
            "get_or_create": true
        });

        let request = self.client()?.post(self.collections_endpoint()).json(&body);
        let collection: ChromaCollection = send(request, Error::Collection).await?;

        debug!(collection = %collection.name, id = %collection.id, "Collection ready");
        self.collection = Some(collection);
        Ok(())
    }

    async fn open_collection(&mut self, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.collections_endpoint(), name);
        let collection: ChromaCollection = send(self.client()?.get(url), Error::Collection).await?;

        debug!(collection = %collection.name, id = %collection.id, "Opened collection");
        self.collection = Some(collection);
        Ok(())
    }

    async fn upsert_batch(&self, batch: PointBatch) -> Result<()> {
        let ids: Vec<String> = batch.ids.iter().map(|id| id.to_string()).collect();
        let body = json!({
            "ids": ids,
            "embeddings": batch.vectors,
            "metadatas": batch.payloads,
        });

        let request = self.client()?.post(self.collection_endpoint("upsert")?).json(&body);
        let _: serde_json::Value = send(request, Error::Upsert).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], params: &SearchParams) -> Result<SearchResults> {
        let body = json!({
            "query_embeddings": [vector],
            "n_results": params.top_k,
            "include": ["distances"],
        });

        let request = self.client()?.post(self.collection_endpoint("query")?).json(&body);
        let response: QueryResponse = send(request, Error::QueryExecution).await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let results = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| SearchResult {
                id,
                score: distances.get(i).copied().flatten().unwrap_or_default(),
            })
            .collect();

        Ok(SearchResults::new(results))
    }
}
