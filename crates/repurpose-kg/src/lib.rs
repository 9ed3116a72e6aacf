//! repurpose-kg — Knowledge-graph collaborators, disease resolution and candidate aggregation.

pub mod client;
pub mod opentargets;
pub mod chembl;
pub mod names;
pub mod name_cache;
pub mod resolver;
pub mod aggregator;

pub use aggregator::CandidateAggregator;
pub use client::{KnowledgeGraph, MockKnowledgeGraph};
pub use name_cache::{CacheBackend, JsonFileBackend, MemoryBackend, NameCache};
pub use names::{NameResolver, NameSource};
pub use resolver::DiseaseResolver;
