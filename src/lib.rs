// Re-export main components
pub mod api;
pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod index;
pub mod ranking;
pub mod thai;
pub mod tokenizer;

// Re-export commonly used types
pub use catalog::{CatalogSource, FileCatalog, MemoryCatalog};
pub use document::{CatalogItem, Document};
pub use engine::{merge_tiers, SearchEngine, SearchResponse, SearchResult, Tier};
pub use enrich::{EnrichedResult, Enrichment, MetadataProvider};
pub use error::{CatalogError, SearchError};
pub use index::{CorpusIndex, IndexStats};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
