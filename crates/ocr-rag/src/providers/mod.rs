//! Provider abstractions for state, text, embeddings and vector storage
//!
//! The pipeline and query engine only see these traits; concrete backends are
//! chosen from configuration when the service is built.

pub mod embedding;
pub mod local;
pub mod ollama;
pub mod qdrant;
pub mod sparse;
pub mod state_store;
pub mod text_store;
pub mod vector_store;

pub use embedding::{EmbeddingProvider, SparseVector};
pub use local::LocalVectorStore;
pub use ollama::OllamaEmbedder;
pub use qdrant::QdrantVectorStore;
pub use sparse::TermWeightEncoder;
pub use state_store::StateStore;
pub use text_store::TextStore;
pub use vector_store::{PointPayload, ScoredPoint, VectorPoint, VectorStoreProvider};
