//! Operation kinds carried in the `interface` field of every request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of operations a branch understands.
///
/// `Query`, `Deposit` and `Withdraw` are issued by customers and gated by the
/// write-set token. The `Propagate*` kinds are only sent branch-to-branch and
/// are applied unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Deposit,
    Withdraw,
    PropagateDeposit,
    PropagateWithdraw,
}

impl Operation {
    /// Wire name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::PropagateDeposit => "propagate_deposit",
            Operation::PropagateWithdraw => "propagate_withdraw",
        }
    }

    /// The peer-facing counterpart of a customer write, if any.
    pub fn propagated(self) -> Option<Operation> {
        match self {
            Operation::Deposit => Some(Operation::PropagateDeposit),
            Operation::Withdraw => Some(Operation::PropagateWithdraw),
            Operation::Query | Operation::PropagateDeposit | Operation::PropagateWithdraw => None,
        }
    }

    /// Returns true for the kinds a customer may issue.
    pub fn is_customer_facing(self) -> bool {
        matches!(
            self,
            Operation::Query | Operation::Deposit | Operation::Withdraw
        )
    }

    /// Applies this operation's effect on a balance.
    ///
    /// There is no sufficiency check, so withdrawals may go negative. The
    /// arithmetic saturates at the `i64` bounds.
    pub fn apply(self, balance: i64, amount: i64) -> i64 {
        match self {
            Operation::Query => balance,
            Operation::Deposit | Operation::PropagateDeposit => balance.saturating_add(amount),
            Operation::Withdraw | Operation::PropagateWithdraw => balance.saturating_sub(amount),
        }
    }
}

impl FromStr for Operation {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Operation::Query),
            "deposit" => Ok(Operation::Deposit),
            "withdraw" => Ok(Operation::Withdraw),
            "propagate_deposit" => Ok(Operation::PropagateDeposit),
            "propagate_withdraw" => Ok(Operation::PropagateWithdraw),
            _ => Err("unknown operation"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
