//! Replicated ledger protocol.
//!
//! This module contains the branch replica, the customer driver, the
//! propagator that forwards accepted writes, and the types they share.

pub mod branch;
pub mod customer;
pub mod propagator;
pub mod types;

// Re-export the main public API
pub use branch::{Branch, BranchSnapshot};
pub use customer::{Customer, DEFAULT_RETRY_INTERVAL, Event, Report};
pub use propagator::{DEFAULT_PROPAGATION_DELAY, MIN_PROPAGATION_DELAY, Propagate, Propagator};
pub use types::{Amount, BranchId, CustomerId, Operation, Outcome, Reply, Request, WriteSet};
