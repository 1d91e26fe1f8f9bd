//! Deferred forwarding of accepted writes to peer branches.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::ledger::types::{BranchId, Request};
use crate::transport::Transport;

/// The delay between accepting a write and forwarding it to peers.
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(1);

/// The shortest delay a [`Propagator`] runs with. The reply to a write always
/// leaves before the write is forwarded.
pub const MIN_PROPAGATION_DELAY: Duration = Duration::from_millis(1);

/// Schedules delivery of a propagated write to a set of peers.
///
/// A branch calls this while it still holds its own lock, so writes from one
/// origin are scheduled in the order they were accepted. Implementations must
/// return immediately and must not call back into the branch. Each call
/// forwards its request at most once and never retries a peer that fails.
pub trait Propagate: Send + Sync {
    fn schedule(&self, origin: BranchId, peers: &[BranchId], request: Request);
}

/// A write waiting for its deadline.
#[derive(Debug)]
struct Pending {
    peers: Vec<BranchId>,
    request: Request,
    due: Instant,
}

/// Counts writes that were scheduled but not yet sent to every peer.
#[derive(Debug, Default)]
struct Progress {
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Progress {
    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Fire-and-forget propagation over a [`Transport`].
///
/// Every origin branch gets one queue and one worker task. A write's deadline
/// is fixed when it is scheduled; the worker waits for it, then delivers the
/// write to each peer in turn before taking the next one. Writes from one
/// origin therefore reach every peer in the order the origin accepted them.
///
/// Delivery failures are logged and dropped; a peer that misses a write never
/// catches up.
#[derive(Debug)]
pub struct Propagator<T> {
    transport: T,
    delay: Duration,
    queues: Mutex<HashMap<BranchId, mpsc::UnboundedSender<Pending>>>,
    progress: Arc<Progress>,
}

impl<T: Transport> Propagator<T> {
    /// Creates a propagator. A zero `delay` is raised to
    /// [`MIN_PROPAGATION_DELAY`].
    pub fn new(transport: T, delay: Duration) -> Self {
        if delay < MIN_PROPAGATION_DELAY {
            warn!(
                "Propagation delay {:?} is too short; using {:?}",
                delay, MIN_PROPAGATION_DELAY
            );
        }
        Propagator {
            transport,
            delay: delay.max(MIN_PROPAGATION_DELAY),
            queues: Mutex::new(HashMap::new()),
            progress: Arc::new(Progress::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of writes not yet sent to every peer.
    pub fn in_flight(&self) -> usize {
        self.progress.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once every scheduled write has been sent to every peer.
    pub async fn idle(&self) {
        loop {
            let idle = self.progress.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    fn start_worker(&self, origin: BranchId) -> Option<mpsc::UnboundedSender<Pending>> {
        let runtime = Handle::try_current().ok()?;
        let (queue, pending) = mpsc::unbounded_channel();
        runtime.spawn(drain(
            origin,
            self.transport.clone(),
            pending,
            Arc::clone(&self.progress),
        ));
        Some(queue)
    }
}

impl<T: Transport> Propagate for Propagator<T> {
    fn schedule(&self, origin: BranchId, peers: &[BranchId], request: Request) {
        if peers.is_empty() {
            return;
        }
        let mut write = Pending {
            peers: peers.to_vec(),
            request,
            due: Instant::now() + self.delay,
        };

        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(&origin) {
            self.progress.begin();
            match queue.send(write) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    // The worker went down with its runtime
                    self.progress.finish();
                    queues.remove(&origin);
                    write = returned;
                }
            }
        }

        let Some(queue) = self.start_worker(origin) else {
            warn!(
                "Branch {} has no async runtime; dropping {} at {}",
                origin, write.request.operation, write.request.write_set
            );
            return;
        };
        self.progress.begin();
        if queue.send(write).is_err() {
            self.progress.finish();
            return;
        }
        queues.insert(origin, queue);
    }
}

/// Forwards one origin's writes in FIFO order, each after its deadline.
async fn drain<T: Transport>(
    origin: BranchId,
    transport: T,
    mut pending: mpsc::UnboundedReceiver<Pending>,
    progress: Arc<Progress>,
) {
    while let Some(Pending {
        peers,
        request,
        due,
    }) = pending.recv().await
    {
        sleep_until(due).await;
        debug!(
            "Branch {} propagating {} {} at {}",
            origin, request.operation, request.amount, request.write_set
        );
        for peer in peers {
            match transport.deliver(peer, request.clone()).await {
                Ok(reply) if reply.is_success() => {}
                Ok(reply) => warn!(
                    "Branch {} propagation to {} was refused: {:?}",
                    origin, peer, reply
                ),
                Err(e) => warn!("Branch {} failed to propagate to {}: {}", origin, peer, e),
            }
        }
        progress.finish();
    }
}
