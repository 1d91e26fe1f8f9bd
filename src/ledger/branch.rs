//! Core branch replica implementation.
//!
//! This module contains the Branch struct, one replica of the bank ledger.
//! A branch accepts customer requests whose write-set token matches its own,
//! and hands every accepted write to a [`Propagate`] implementation so that
//! peer branches converge on the same balance and token.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::ledger::propagator::Propagate;
use crate::ledger::types::{Amount, BranchId, Operation, Reply, Request, WriteSet};

/// The mutable half of a branch. Always accessed under the branch's lock.
#[derive(Debug)]
struct Ledger {
    balance: Amount,
    write_set: WriteSet,
}

/// A point-in-time copy of a branch's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchSnapshot {
    pub id: BranchId,
    pub balance: Amount,
    #[serde(rename = "writeSet")]
    pub write_set: WriteSet,
}

/// One replica of the bank ledger.
///
/// # Design
///
/// - Token equality gates every customer request
/// - Propagated writes replace the token instead of appending to it
/// - The token check and the mutation happen under one mutex, so concurrent
///   requests on the same branch are serialized
/// - Accepted writes are queued for propagation before the lock is released, so
///   peers receive them in acceptance order; sending happens later and never
///   delays the reply
pub struct Branch {
    /// The unique identifier for this branch
    id: BranchId,
    /// Every other branch in the topology
    peers: Vec<BranchId>,
    ledger: Mutex<Ledger>,
    propagator: Arc<dyn Propagate>,
}

impl Branch {
    /// Creates a branch holding `balance`, starting at the genesis token.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier for this branch
    /// * `balance` - The opening balance
    /// * `peers` - The branches accepted writes are forwarded to
    /// * `propagator` - Schedules the forwarding
    pub fn new(
        id: BranchId,
        balance: Amount,
        peers: Vec<BranchId>,
        propagator: Arc<dyn Propagate>,
    ) -> Self {
        Branch {
            id,
            peers: peers.into_iter().filter(|&peer| peer != id).collect(),
            ledger: Mutex::new(Ledger {
                balance,
                write_set: WriteSet::genesis(),
            }),
            propagator,
        }
    }

    /// Gets the branch ID.
    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Gets the peers accepted writes are forwarded to.
    pub fn peers(&self) -> &[BranchId] {
        &self.peers
    }

    /// Gets the current balance.
    pub fn balance(&self) -> Amount {
        self.ledger.lock().balance
    }

    /// Gets a copy of the current write-set token.
    pub fn write_set(&self) -> WriteSet {
        self.ledger.lock().write_set.clone()
    }

    /// Gets the balance and token as one consistent snapshot.
    pub fn snapshot(&self) -> BranchSnapshot {
        let ledger = self.ledger.lock();
        BranchSnapshot {
            id: self.id,
            balance: ledger.balance,
            write_set: ledger.write_set.clone(),
        }
    }

    /// Handles one request and returns the reply.
    ///
    /// * `query` succeeds with the balance iff the tokens match.
    /// * `deposit`/`withdraw` apply iff the tokens match; the token then gains
    ///   one entry and the write is scheduled for propagation to every peer.
    /// * `propagate_deposit`/`propagate_withdraw` always apply and adopt the
    ///   sender's token.
    ///
    /// A token mismatch yields a `failed` reply with no state change.
    pub fn deliver(&self, request: Request) -> Reply {
        let Request {
            operation,
            amount,
            write_set,
        } = request;

        let reply = {
            let mut ledger = self.ledger.lock();
            match operation {
                Operation::Query => {
                    if ledger.write_set == write_set {
                        Reply::success(operation, ledger.balance)
                    } else {
                        Reply::failed(operation)
                    }
                }
                Operation::Deposit | Operation::Withdraw => {
                    if ledger.write_set == write_set {
                        ledger.write_set = ledger.write_set.next();
                        ledger.balance = operation.apply(ledger.balance, amount);
                        if let Some(propagated) = operation.propagated() {
                            let forward =
                                Request::new(propagated, amount, ledger.write_set.clone());
                            self.propagator.schedule(self.id, &self.peers, forward);
                        }
                        Reply::success(operation, ledger.balance)
                    } else {
                        Reply::failed(operation)
                    }
                }
                Operation::PropagateDeposit | Operation::PropagateWithdraw => {
                    ledger.write_set = write_set;
                    ledger.balance = operation.apply(ledger.balance, amount);
                    Reply::success(operation, ledger.balance)
                }
            }
        };

        debug!(
            "Branch {} handled {} {}: {:?} {:?}",
            self.id, operation, amount, reply.result, reply.money
        );

        reply
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self.ledger.lock();
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("peers", &self.peers)
            .field("balance", &ledger.balance)
            .field("write_set", &ledger.write_set)
            .finish()
    }
}
