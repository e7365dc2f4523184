pub mod retrieval;
pub mod rules;

pub use retrieval::{ChunkHit, QueryEngine, QueryError, QueryRequest, QueryResponse, RelatedDocument};
pub use rules::{RuleEventStore, RuleMatchStore, RuleStore, RuleStoreError};
