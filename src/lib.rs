//! Client-side snapshot reconciliation and notification core for a
//! peer-to-peer cash/crypto exchange. The backend is the source of
//! truth; this crate turns periodic polled snapshots into a consistent,
//! idempotent stream of user-visible signals.

pub mod api;
mod error;
pub mod services;
mod state;

pub use error::{DealwatchError, Result};
pub use state::AppState;
