//! Request and reply messages exchanged between customers and branches.
//!
//! The wire shape is JSON with amounts carried as decimal text:
//!
//! ```text
//! request: {"interface": "deposit", "money": "50", "writeSet": [0]}
//! reply:   {"interface": "deposit", "result": "success", "money": "150"}
//! ```

use serde::{Deserialize, Serialize};

use crate::ledger::types::operation::Operation;
use crate::ledger::types::write_set::WriteSet;

/// A signed amount of money. Balances may go negative.
pub type Amount = i64;

/// The `interface` a branch answers with when it cannot decode a request.
pub const UNKNOWN_OPERATION: &str = "unknown_operation";

/// A single request delivered to a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "interface")]
    pub operation: Operation,
    #[serde(rename = "money", with = "amount_text")]
    pub amount: Amount,
    #[serde(rename = "writeSet")]
    pub write_set: WriteSet,
}

impl Request {
    pub fn new(operation: Operation, amount: Amount, write_set: WriteSet) -> Self {
        Request {
            operation,
            amount,
            write_set,
        }
    }

    /// Creates a balance query. Queries carry a zero amount on the wire.
    pub fn query(write_set: WriteSet) -> Self {
        Request::new(Operation::Query, 0, write_set)
    }
}

/// Whether a branch accepted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// A branch's answer to a request.
///
/// `interface` is `None` only for requests the branch could not decode; it
/// goes on the wire as `"unknown_operation"`. `money` is the balance after the
/// request was applied, or `None` (`"null"`) when the request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(with = "interface_text")]
    pub interface: Option<Operation>,
    pub result: Outcome,
    #[serde(with = "balance_text")]
    pub money: Option<Amount>,
}

impl Reply {
    pub fn success(operation: Operation, balance: Amount) -> Self {
        Reply {
            interface: Some(operation),
            result: Outcome::Success,
            money: Some(balance),
        }
    }

    pub fn failed(operation: Operation) -> Self {
        Reply {
            interface: Some(operation),
            result: Outcome::Failed,
            money: None,
        }
    }

    /// The reply to a frame that did not decode into a [`Request`].
    pub fn unknown_operation() -> Self {
        Reply {
            interface: None,
            result: Outcome::Failed,
            money: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == Outcome::Success
    }
}

/// Amounts as decimal text. Bare JSON numbers are accepted on input.
pub(crate) mod amount_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Amount;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(Amount),
        Text(String),
    }

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(amount) => Ok(amount),
            Raw::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid amount {:?}", text))),
        }
    }
}

/// Optional balances, with `"null"` standing in for a rejected request.
mod balance_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Amount;

    pub fn serialize<S: Serializer>(
        balance: &Option<Amount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match balance {
            Some(balance) => serializer.collect_str(balance),
            None => serializer.serialize_str("null"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Amount>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "null" {
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid balance {:?}", text)))
    }
}

mod interface_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::UNKNOWN_OPERATION;
    use crate::ledger::types::operation::Operation;

    pub fn serialize<S: Serializer>(
        interface: &Option<Operation>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(interface.map_or(UNKNOWN_OPERATION, Operation::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Operation>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == UNKNOWN_OPERATION {
            return Ok(None);
        }
        text.parse().map(Some).map_err(D::Error::custom)
    }
}
