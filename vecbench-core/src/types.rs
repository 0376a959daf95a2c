/// JSON object stored alongside a vector
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identifier assigned to a point at upsert time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointId {
    Num(u64),
    Text(String),
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Text(s) => f.write_str(s),
        }
    }
}

/// A batch of points ready for upsert; the three vectors are index-aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBatch {
    pub ids: Vec<PointId>,
    pub vectors: Vec<Vec<f32>>,
    pub payloads: Vec<Payload>,
}

impl PointBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A single search result from a backend
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Point identifier
    pub id: String,
    /// Similarity score or distance, as reported by the backend
    pub score: f32,
}

/// Collection of search results from a query
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self { results }
    }
}

pub const DEFAULT_TOP_K: usize = 10;

/// Parameters for search execution
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Number of results to return
    pub top_k: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}
