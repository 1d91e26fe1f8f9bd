//! Type definitions for the branch ledger protocol.
//!
//! This module contains the fundamental types shared by branches, customers
//! and transports: identifiers, the write-set token and the wire messages.

pub mod message;
pub mod operation;
pub mod write_set;

pub use message::{Amount, Outcome, Reply, Request, UNKNOWN_OPERATION};
pub use operation::Operation;
pub use write_set::WriteSet;

/// Identifies a branch replica. Branch ids are unique within a topology.
pub type BranchId = u64;

/// Identifies a customer.
pub type CustomerId = u64;
