//! Shared identifiers and request context for the checkout service.

pub mod context;
pub mod history;
pub mod trace;
pub mod types;

pub use context::{CancelReason, Canceller, RequestContext};
pub use history::{DEFAULT_RETENTION, History};
pub use types::{OrderId, ProductId, UserId};
