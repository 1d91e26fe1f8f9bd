//! # Bank Replica - Write-Set Ordered Branch Ledgers
//!
//! A replicated bank in which every branch keeps its own copy of the balance.
//! Writes are ordered by a write-set token: a branch only accepts a request
//! whose token equals its own, and forwards every accepted write to its peers
//! after a short delay.
//!
//! ## Features
//!
//! - **Token-gated acceptance**: stale callers get a `failed` reply and retry
//! - **Deferred propagation**: accepted writes reach peers without delaying the reply
//! - **Serialized replicas**: check-and-mutate runs under one lock per branch
//! - **Pluggable transport**: WebSocket JSON frames, or direct in-process calls
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bank_replica::{Branch, InProcessTransport, Operation, Propagator, Request, WriteSet};
//!
//! let transport = InProcessTransport::default();
//! let propagator = Arc::new(Propagator::new(transport.clone(), Duration::from_secs(1)));
//! let branch = Arc::new(Branch::new(1, 100, Vec::new(), propagator));
//!
//! let reply = branch.deliver(Request::new(Operation::Deposit, 50, WriteSet::genesis()));
//! assert_eq!(reply.money, Some(150));
//! ```

pub mod config;
pub mod launcher;
pub mod ledger;
pub mod server;
pub mod transport;

// Re-export the main public API from the ledger module
pub use ledger::{Amount, BranchId, CustomerId, Operation, Outcome, Reply, Request, WriteSet};
pub use ledger::{Branch, BranchSnapshot, Customer, Event, Propagate, Propagator, Report};
pub use transport::{InProcessTransport, Transport, TransportError, WebSocketTransport};
