pub mod analyst;
pub mod queue;
pub mod tagger;
pub mod worker_pool;
