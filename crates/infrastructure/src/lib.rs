pub mod communicator;
pub mod document_store;
pub mod memory_store;
pub mod observability;

pub use communicator::{Communicator, DirectoryEntry, PollResponse};
pub use document_store::HttpDocumentStore;
pub use memory_store::InMemoryDocumentStore;
pub use observability::{install_prometheus_recorder, MetricsCollector};
