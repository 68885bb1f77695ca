use duet_core::ClientId;
use std::collections::{HashMap, VecDeque};
use tracing::{error, info};

/// Result of a `join` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Pool was empty; the client now waits at the tail.
    Queued,
    /// The client was paired with the longest-waiting one.
    Matched { partner_id: ClientId },
    AlreadyWaiting,
    AlreadyPaired,
}

/// Result of resolving where a client's signals should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairLookup {
    Unpaired,
    Paired(ClientId),
    /// Directory entries disagree; the pairing must be dissolved.
    Broken(ClientId),
}

/// Waiting pool plus partner directory.
///
/// A client is in exactly one of three states: waiting (in `pool`), paired
/// (a key of `partners`) or idle (in neither). Not thread safe on its own;
/// the lobby event loop is its only owner.
#[derive(Debug, Default)]
pub struct Matchmaker {
    pool: VecDeque<ClientId>,
    partners: HashMap<ClientId, ClientId>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, client_id: &ClientId) -> JoinOutcome {
        if self.partners.contains_key(client_id) {
            return JoinOutcome::AlreadyPaired;
        }
        if self.pool.contains(client_id) {
            return JoinOutcome::AlreadyWaiting;
        }

        let Some(partner_id) = self.pool.pop_front() else {
            self.pool.push_back(client_id.clone());
            return JoinOutcome::Queued;
        };

        info!("Pairing {} with {}", client_id, partner_id);
        self.partners.insert(client_id.clone(), partner_id.clone());
        self.partners.insert(partner_id.clone(), client_id.clone());

        JoinOutcome::Matched { partner_id }
    }

    /// Drops the client from the pool and the directory.
    ///
    /// Returns every client that lost its partner and must be told so.
    /// Calling it again for the same id returns nothing.
    pub fn leave(&mut self, client_id: &ClientId) -> Vec<ClientId> {
        self.pool.retain(|id| id != client_id);

        let Some(partner_id) = self.partners.remove(client_id) else {
            return Vec::new();
        };

        match self.partners.remove(&partner_id) {
            Some(back) if &back == client_id => vec![partner_id],
            Some(other) => {
                error!(
                    "Directory asymmetry: {} -> {} but {} -> {}",
                    client_id, partner_id, partner_id, other
                );
                let mut orphaned = vec![partner_id.clone()];
                if self.partners.get(&other) == Some(&partner_id) {
                    self.partners.remove(&other);
                    orphaned.push(other);
                }
                orphaned
            }
            None => {
                error!(
                    "Directory asymmetry: {} -> {} has no reverse entry",
                    client_id, partner_id
                );
                vec![partner_id]
            }
        }
    }

    pub fn lookup(&self, client_id: &ClientId) -> PairLookup {
        let Some(partner_id) = self.partners.get(client_id) else {
            return PairLookup::Unpaired;
        };

        if self.partners.get(partner_id) == Some(client_id) {
            PairLookup::Paired(partner_id.clone())
        } else {
            PairLookup::Broken(partner_id.clone())
        }
    }

    pub fn partner_of(&self, client_id: &ClientId) -> Option<&ClientId> {
        self.partners.get(client_id)
    }

    pub fn is_waiting(&self, client_id: &ClientId) -> bool {
        self.pool.contains(client_id)
    }

    pub fn waiting(&self) -> impl Iterator<Item = &ClientId> {
        self.pool.iter()
    }

    /// Each pair once, smaller id first.
    pub fn pairs(&self) -> Vec<(ClientId, ClientId)> {
        let mut pairs: Vec<_> = self
            .partners
            .iter()
            .filter(|(a, b)| a < b)
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Pool exclusivity and directory symmetry.
    pub fn is_consistent(&self) -> bool {
        let exclusive = self.pool.iter().all(|id| !self.partners.contains_key(id));
        let symmetric = self
            .partners
            .iter()
            .all(|(a, b)| self.partners.get(b) == Some(a));
        exclusive && symmetric
    }

    #[cfg(test)]
    fn corrupt(&mut self, from: &str, to: &str) {
        self.partners.insert(ClientId::from(from), ClientId::from(to));
    }
}
