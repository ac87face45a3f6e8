pub mod fetcher;
pub mod master_client;
pub mod service;

pub use fetcher::{payload_from_record, HttpJsonFetcher, JobFetcher};
pub use master_client::{CompletionReceipt, MasterClient};
pub use service::{BatchOutcome, CrawlWorker};
