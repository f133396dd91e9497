//! Connection wrapper.
//!
//! A `Connection` owns one logical session over a succession of raw sockets:
//! the outbound queue, the reconnect state machine and typed message
//! callbacks. Its driver task is the single owner of the current raw socket.
//!
//! ```text
//! Connecting --dial ok--> Open --lost (client, reconnect)--> Reconnecting
//!     |                    |  ^                                   |
//!     |                    |  +------------- dial ok -------------+
//!     +--dial failed (no reconnect) / close / lost --> Closed <---+ close
//! ```

mod callbacks;
mod driver;
mod handle;
mod options;
mod queue;
mod state;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use handle::Connection;
pub use options::{ConnectionOptions, ReconnectPolicy};
pub use state::{CloseReason, ConnectionState, Role};

/// Lock without propagating poisoning; the guarded data stays consistent
/// because no critical section panics midway.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
