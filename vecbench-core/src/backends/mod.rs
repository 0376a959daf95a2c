#[cfg(feature = "chroma")]
pub mod chroma;

#[cfg(feature = "qdrant")]
pub mod qdrant;

// re-export backend types when features are enabled
#[cfg(feature = "chroma")]
pub use chroma::ChromaBackend;

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantBackend;

use crate::backend::{BackendFactory, VectorBackend};
use crate::config::{BackendKind, TargetDescriptor};
use crate::error::{Error, Result};

/// Maps each [`BackendKind`] to the backend compiled into this build
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl BackendFactory for DefaultFactory {
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn VectorBackend>> {
        match kind {
            #[cfg(feature = "qdrant")]
            BackendKind::Qdrant => Ok(Box::new(QdrantBackend::new(target.clone()))),

            #[cfg(feature = "chroma")]
            BackendKind::Chroma => Ok(Box::new(ChromaBackend::new(target.clone())?)),

            #[allow(unreachable_patterns)]
            _ => {
                let _ = target;
                Err(Error::Unsupported(format!(
                    "Backend {} is not enabled in this build",
                    kind
                )))
            }
        }
    }
}
