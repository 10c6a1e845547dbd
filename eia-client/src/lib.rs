pub mod api;
pub mod domain;

pub use api::{ClientConfig, ClientError, DataQuery, EiaClient};
