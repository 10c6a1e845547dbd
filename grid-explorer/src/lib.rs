pub mod acquisition;
pub mod aggregate;
pub mod api;
pub mod config;
pub mod export;
pub mod filter;
pub mod geometry;
pub mod metrics_server;
pub mod observability;
pub mod sources;
pub mod view;

pub use acquisition::{Provider, TransportError};
pub use view::{SessionEvent, SessionHandle, ViewSnapshot};
