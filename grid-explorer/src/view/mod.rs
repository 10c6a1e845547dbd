//! Session state: the reactive record pipeline and the task that owns it.

pub mod session;
pub mod state;

pub use session::{spawn, SessionClosed, SessionEvent, SessionHandle, SessionOptions};
pub use state::{LoadProgress, PolygonPhase, ViewSnapshot, ViewState};
