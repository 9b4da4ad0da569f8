//! Synchronization engine
//!
//! - `clock`: injectable time source for audit timestamps
//! - `worker`: per-entity-type poll/apply loop
//! - `coordinator`: worker lifecycle and shared cancellation

pub mod clock;
pub mod coordinator;
pub mod worker;

pub use clock::*;
pub use coordinator::*;
pub use worker::*;
