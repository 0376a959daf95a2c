pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod records;
pub mod report;
pub mod runner;
pub mod types;
pub mod vectors;

// re-exports
pub use backend::{BackendFactory, Capabilities, VectorBackend};
pub use backends::DefaultFactory;
pub use config::{BackendKind, Config, PartialBatchPolicy, TargetDescriptor};
pub use error::{Error, Result, Section};
pub use report::ResultRecord;
pub use runner::{LoadRunner, RunOptions, RunSummary, SearchRunner, TargetOutcome};
pub use types::{PointBatch, PointId, SearchParams, SearchResult, SearchResults};
