mod client;
mod de;
mod error;

pub mod capacity;
pub mod generation;

pub use client::{ClientConfig, DataPage, DataQuery, EiaClient, MAX_PAGE_SIZE};
pub use error::ClientError;
