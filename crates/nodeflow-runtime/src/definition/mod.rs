//! Persistence boundary: graph documents and metadata.

mod convert;
mod document;
mod metadata;

pub use document::{ConnectionDocument, DOCUMENT_VERSION, GraphDocument, NodeDocument, PortDocument};
pub use metadata::GraphMetadata;

/// Tracing target for document conversion.
const TRACING_TARGET: &str = "nodeflow_runtime::definition";
