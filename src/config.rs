//! Bootstrap configuration: which branches and customers make up a run.
//!
//! The input is a JSON array of process descriptors:
//!
//! ```json
//! [
//!   {"type": "branch", "id": 1, "balance": 400},
//!   {"type": "customer", "id": 1, "events": [{"dest": 1, "interface": "deposit", "money": 70}]}
//! ]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ledger::customer::{DEFAULT_RETRY_INTERVAL, Event};
use crate::ledger::propagator::DEFAULT_PROPAGATION_DELAY;
use crate::ledger::types::{Amount, BranchId, CustomerId, Operation};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid topology json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("branch {0} is declared more than once")]
    DuplicateBranch(BranchId),
    #[error("customer {0} is declared more than once")]
    DuplicateCustomer(CustomerId),
    #[error("customer {customer} sends to unknown branch {dest}")]
    UnknownDestination { customer: CustomerId, dest: BranchId },
    #[error("customer {customer} cannot issue {operation}")]
    ForbiddenOperation {
        customer: CustomerId,
        operation: Operation,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchConfig {
    pub id: BranchId,
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerConfig {
    pub id: CustomerId,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One entry of the input array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessConfig {
    Branch(BranchConfig),
    Customer(CustomerConfig),
}

/// A validated set of branches and customers, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub branches: Vec<BranchConfig>,
    pub customers: Vec<CustomerConfig>,
}

impl Topology {
    /// Reads and validates a topology file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Topology::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let processes: Vec<ProcessConfig> = serde_json::from_str(text)?;
        Topology::from_processes(processes)
    }

    pub fn from_processes(processes: Vec<ProcessConfig>) -> Result<Self, ConfigError> {
        let mut branches = Vec::new();
        let mut customers = Vec::new();
        for process in processes {
            match process {
                ProcessConfig::Branch(branch) => branches.push(branch),
                ProcessConfig::Customer(customer) => customers.push(customer),
            }
        }

        let topology = Topology {
            branches,
            customers,
        };
        topology.validate()?;
        Ok(topology)
    }

    /// Ids of every branch, in input order.
    pub fn branch_ids(&self) -> Vec<BranchId> {
        self.branches.iter().map(|branch| branch.id).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut branch_ids = HashSet::new();
        for branch in &self.branches {
            if !branch_ids.insert(branch.id) {
                return Err(ConfigError::DuplicateBranch(branch.id));
            }
        }

        let mut customer_ids = HashSet::new();
        for customer in &self.customers {
            if !customer_ids.insert(customer.id) {
                return Err(ConfigError::DuplicateCustomer(customer.id));
            }
            for event in &customer.events {
                if !event.interface.is_customer_facing() {
                    return Err(ConfigError::ForbiddenOperation {
                        customer: customer.id,
                        operation: event.interface,
                    });
                }
                if !branch_ids.contains(&event.dest) {
                    return Err(ConfigError::UnknownDestination {
                        customer: customer.id,
                        dest: event.dest,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Delays that shape a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Between accepting a write and forwarding it to peers
    pub propagation_delay: Duration,
    /// Between a rejected request and its resend
    pub retry_interval: Duration,
    /// Between starting the branches and starting the customers
    pub settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            settle: Duration::from_secs(1),
        }
    }
}
