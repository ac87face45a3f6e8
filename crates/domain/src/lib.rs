pub mod entities;
pub mod repositories;
pub mod services;

pub use crawler_core::{CrawlerError, CrawlerResult};
pub use entities::*;
pub use repositories::*;
pub use services::*;
