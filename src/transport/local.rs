//! In-process transport: delivers requests by calling branches directly.

use std::future::Future;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::ledger::branch::Branch;
use crate::ledger::types::{BranchId, Reply, Request};
use crate::transport::{Transport, TransportError};

/// A directory of branches living in the same process.
///
/// Cloning is cheap and every clone sees the same directory, so a transport
/// can be handed to propagators before the branches it routes to are
/// registered.
#[derive(Clone, Default)]
pub struct InProcessTransport {
    branches: Arc<SkipMap<BranchId, Arc<Branch>>>,
}

impl InProcessTransport {
    /// Makes `branch` reachable under its own id, replacing any previous entry.
    pub fn register(&self, branch: Arc<Branch>) {
        self.branches.insert(branch.id(), branch);
    }

    /// Looks up a registered branch.
    pub fn branch(&self, id: BranchId) -> Option<Arc<Branch>> {
        self.branches.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns every registered branch ordered by id.
    pub fn branches(&self) -> Vec<Arc<Branch>> {
        self.branches
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Transport for InProcessTransport {
    fn deliver(
        &self,
        dest: BranchId,
        request: Request,
    ) -> impl Future<Output = Result<Reply, TransportError>> + Send {
        let branch = self.branch(dest);
        async move {
            let branch = branch.ok_or(TransportError::UnknownBranch(dest))?;
            Ok(branch.deliver(request))
        }
    }
}
