//! Customer driver: replays a fixed script of operations against branches.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ledger::types::message::amount_text;
use crate::ledger::types::{Amount, BranchId, CustomerId, Operation, Reply, Request, WriteSet};
use crate::transport::{Transport, TransportError};

/// How long a customer waits before resending a rejected request.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(300);

/// One scripted step of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The branch the request is sent to
    pub dest: BranchId,
    pub interface: Operation,
    #[serde(default, with = "amount_text")]
    pub money: Amount,
}

impl Event {
    pub fn new(dest: BranchId, interface: Operation, money: Amount) -> Self {
        Event {
            dest,
            interface,
            money,
        }
    }
}

/// The replies a customer collected, in event order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub id: CustomerId,
    pub recv: Vec<Reply>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A client that issues its events strictly in order.
///
/// The customer keeps its own write-set token, which counts the operations it
/// has had accepted. Every request carries that token; a rejected request is
/// resent unchanged after [`Customer::retry_interval`] until some branch state
/// matches it.
///
/// The retry loop has no cap and no backoff. A token that no branch will ever
/// reach (for example because a propagation was lost) stalls the customer
/// forever.
#[derive(Debug, Clone)]
pub struct Customer {
    id: CustomerId,
    events: Vec<Event>,
    write_set: WriteSet,
    recv: Vec<Reply>,
    retry_interval: Duration,
}

impl Customer {
    pub fn new(id: CustomerId, events: Vec<Event>) -> Self {
        Customer {
            id,
            events,
            write_set: WriteSet::genesis(),
            recv: Vec::new(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn write_set(&self) -> &WriteSet {
        &self.write_set
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Sends every event in order and returns the collected replies.
    ///
    /// Rejections are retried indefinitely. Transport errors abort the run.
    pub async fn execute_events<T: Transport>(
        &mut self,
        transport: &T,
    ) -> Result<Report, TransportError> {
        info!("Customer {} executing {} events", self.id, self.events.len());
        let started_at = Utc::now();

        for event in &self.events {
            let request = Request::new(event.interface, event.money, self.write_set.clone());
            debug!(
                "Customer {} send: {} {} to {} at {}",
                self.id, event.interface, event.money, event.dest, self.write_set
            );

            let mut reply = transport.deliver(event.dest, request.clone()).await?;
            let mut retries = 0u64;
            while !reply.is_success() {
                retries += 1;
                debug!(
                    "Customer {} retry #{} of {} at {}",
                    self.id, retries, event.interface, self.write_set
                );
                tokio::time::sleep(self.retry_interval).await;
                reply = transport.deliver(event.dest, request.clone()).await?;
            }

            self.write_set = self.write_set.next();
            debug!(
                "Customer {} receive: {} {:?} after {} retries",
                self.id, event.interface, reply.money, retries
            );
            self.recv.push(reply);
        }

        Ok(Report {
            id: self.id,
            recv: self.recv.clone(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}
