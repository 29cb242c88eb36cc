// src/network/endpoint.rs
// Endpoint candidate bookkeeping and the dial-order selection strategy.

use serde::{Deserialize, Serialize};

/// Where a candidate address came from / how it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    NatGateway,
    TcpServer,
}

/// A single dialable address with attempt bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub address: String,
    pub attempts: u32,
    pub succeeded: bool,
    /// Operator-pinned entry; never removed by pruning calls.
    #[serde(default)]
    pub manual_start: bool,
}

impl EndpointCandidate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            attempts: 0,
            succeeded: false,
            manual_start: false,
        }
    }

    pub fn pinned(address: impl Into<String>) -> Self {
        let mut c = Self::new(address);
        c.manual_start = true;
        c
    }
}

/// Ordered set of candidates for one peer and one endpoint kind. Insertion
/// order is significant: the selection strategy breaks ties by it. The holder
/// is expected to lock the set for the whole select-and-increment step.
#[derive(Debug, Default)]
pub struct CandidateSet {
    entries: Vec<EndpointCandidate>,
}

impl CandidateSet {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for addr in addresses {
            set.insert(addr);
        }
        set
    }

    /// Add a candidate if its address is not already present.
    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.entries.iter().any(|c| c.address == address) {
            return false;
        }
        self.entries.push(EndpointCandidate::new(address));
        true
    }

    /// Add an operator-pinned candidate (or pin an existing one).
    pub fn insert_pinned(&mut self, address: impl Into<String>) {
        let address = address.into();
        if let Some(c) = self.entries.iter_mut().find(|c| c.address == address) {
            c.manual_start = true;
            return;
        }
        self.entries.push(EndpointCandidate::pinned(address));
    }

    /// Remove every non-pinned candidate that has never succeeded.
    /// Returns how many entries were dropped.
    pub fn prune_failed(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|c| c.manual_start || c.succeeded || c.attempts == 0);
        before - self.entries.len()
    }

    /// Remove one candidate by address. Pinned entries are removable only
    /// through this explicit call, never through pruning.
    pub fn remove(&mut self, address: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c.address != address);
        before != self.entries.len()
    }

    /// Pick the next candidate worth dialing:
    /// 1. the first never-tried entry (insertion order),
    /// 2. else the first entry that has succeeded before,
    /// 3. else the entry with the fewest attempts, unless every entry is tied
    ///    at the same attempt count, in which case nothing is selected.
    ///
    /// `None` means "no endpoint worth trying right now". A one-entry set
    /// whose candidate has been tried falls under the all-tied rule.
    pub fn select(&self) -> Option<&EndpointCandidate> {
        if self.entries.is_empty() {
            return None;
        }
        if let Some(fresh) = self.entries.iter().find(|c| c.attempts == 0) {
            return Some(fresh);
        }
        if let Some(proven) = self.entries.iter().find(|c| c.succeeded) {
            return Some(proven);
        }
        let min = self.entries.iter().map(|c| c.attempts).min()?;
        let max = self.entries.iter().map(|c| c.attempts).max()?;
        if min == max {
            return None;
        }
        self.entries.iter().find(|c| c.attempts == min)
    }

    /// Bump the attempt counter of the addressed candidate. Callers do this
    /// for the selected candidate before dialing it.
    pub fn increment_attempts(&mut self, address: &str) -> bool {
        if let Some(c) = self.entries.iter_mut().find(|c| c.address == address) {
            c.attempts = c.attempts.saturating_add(1);
            return true;
        }
        false
    }

    /// Record a successful connect. The attempt counter is kept as history.
    pub fn mark_success(&mut self, address: &str) -> bool {
        if let Some(c) = self.entries.iter_mut().find(|c| c.address == address) {
            c.succeeded = true;
            return true;
        }
        false
    }

    /// Zero the attempt counter of one candidate (operator action after a
    /// network change).
    pub fn reset(&mut self, address: &str) -> bool {
        if let Some(c) = self.entries.iter_mut().find(|c| c.address == address) {
            c.attempts = 0;
            return true;
        }
        false
    }

    /// Zero every attempt counter.
    pub fn reset_all(&mut self) {
        for c in &mut self.entries {
            c.attempts = 0;
        }
    }

    /// Select and increment in one step, returning an owned copy of the
    /// chosen candidate. Keeps the two-phase contract atomic under one lock
    /// hold at the call site.
    pub fn take_next(&mut self) -> Option<EndpointCandidate> {
        let address = self.select()?.address.clone();
        self.increment_attempts(&address);
        self.entries
            .iter()
            .find(|c| c.address == address)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&EndpointCandidate> {
        self.entries.iter().find(|c| c.address == address)
    }

    pub fn snapshot(&self) -> Vec<EndpointCandidate> {
        self.entries.clone()
    }
}
