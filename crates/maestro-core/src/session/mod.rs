//! Session state: model, persistence contract, single-flight serialization

mod flight;
mod model;
mod store;

pub use flight::{SessionLocks, SessionPermit};
pub use model::{PendingConfirmation, Session, Turn};
pub use store::{MemorySessionStore, SessionStore};
