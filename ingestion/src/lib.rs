pub mod api;
pub mod coordinator;
pub mod embedding;
pub mod extract;

pub use hive_core::chunker;
