//! Write-set token implementation.
//!
//! This module contains the WriteSet struct, the logical clock that orders
//! writes across branch replicas and customers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The count of writes a branch or customer has observed, encoded as the
/// sequence `[0, 1, ..., n]`.
///
/// Two tokens are equal only when their full sequences are equal. A branch
/// accepts a request exactly when the request's token equals its own, so
/// equality (not ordering) is what gates every write.
///
/// # Design Notes
///
/// WriteSet is an immutable value: [`WriteSet::next`] returns a new token and
/// leaves the receiver untouched. The sequence is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct WriteSet(Vec<u64>);

impl WriteSet {
    /// The token every branch and customer starts with: `[0]`.
    pub fn genesis() -> Self {
        WriteSet(vec![0])
    }

    /// Creates the token reached after `writes` accepted writes.
    pub fn with_writes(writes: u64) -> Self {
        WriteSet((0..=writes).collect())
    }

    /// Returns the successor token, `self + [last + 1]`.
    pub fn next(&self) -> Self {
        let mut entries = Vec::with_capacity(self.0.len() + 1);
        entries.extend_from_slice(&self.0);
        entries.push(self.last() + 1);
        WriteSet(entries)
    }

    /// Gets the last entry of the sequence.
    pub fn last(&self) -> u64 {
        self.0.last().copied().unwrap_or_default()
    }

    /// Gets the number of writes this token accounts for.
    pub fn writes(&self) -> usize {
        self.0.len() - 1
    }

    /// Gets the raw sequence.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

impl Default for WriteSet {
    fn default() -> Self {
        WriteSet::genesis()
    }
}

impl TryFrom<Vec<u64>> for WriteSet {
    type Error = &'static str;

    fn try_from(entries: Vec<u64>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err("write set must contain at least the genesis entry");
        }
        // Only `[0, 1, ..., n]` can be produced by appending `last + 1` to `[0]`
        let canonical = entries
            .iter()
            .enumerate()
            .all(|(index, &entry)| entry == index as u64);
        if !canonical {
            return Err("write set must count up from 0 by one");
        }
        Ok(WriteSet(entries))
    }
}

impl From<WriteSet> for Vec<u64> {
    fn from(write_set: WriteSet) -> Self {
        write_set.0
    }
}

impl fmt::Display for WriteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
