//! Availability monitoring core.
//!
//! - `registry`: durable set of monitored permits
//! - `store`: durable last-seen availability and the diff engine
//! - `poller`: periodic fetch/diff/notify cycle
//! - `notifier`: message formatting and delivery

pub mod notifier;
pub mod poller;
pub mod registry;
pub mod store;

pub use notifier::{Notification, Notifier};
pub use poller::AvailabilityPoller;
pub use registry::PermitRegistry;
pub use store::AvailabilityStore;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// Registry shared between the poller and the command processor.
///
/// Lock order is always registry before store.
pub type SharedRegistry = Arc<RwLock<PermitRegistry>>;

/// Availability store shared between the poller and the command processor.
pub type SharedStore = Arc<Mutex<AvailabilityStore>>;
