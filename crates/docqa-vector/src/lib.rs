//! Vector storage for the retrieval core.
//!
//! [`VectorStorageManager`] owns one collection in an external vector
//! database, reached through the [`VectorStore`]/[`Connector`] seam and a
//! bounded [`ConnectionPool`]. Backends: [`LanceStore`] (LanceDB) and
//! [`MemoryStore`] (in-process, exact search). [`IngestPipeline`] wires the
//! document processor, an embedder and the manager together.

pub mod filter;
pub mod lance;
pub mod manager;
pub mod memory;
pub mod pipeline;
pub mod pool;
pub mod scoring;
pub mod store;

pub use lance::{LanceConnector, LanceStore};
pub use manager::VectorStorageManager;
pub use memory::{MemoryConnector, MemoryStore};
pub use pipeline::{IngestPipeline, IngestReport};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use store::{
    CollectionInfo, CollectionMissing, CollectionSpec, Connector, IndexParams, ScoredPoint, SearchRequest,
    VectorStore,
};
