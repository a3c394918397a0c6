pub mod attachment;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod events;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod path;
pub mod server;
pub mod walker;
