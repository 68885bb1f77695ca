use crate::model::ClientId;
use serde::{Deserialize, Serialize};

/// Which side of a pairing creates the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Caller,
    Callee,
}

impl Role {
    /// The greater id (string ordering) calls; the other waits for the offer.
    ///
    /// Ids are never reused while a connection is open, so two distinct
    /// partners always resolve to exactly one caller.
    pub fn resolve(local: &ClientId, partner: &ClientId) -> Self {
        if local > partner {
            Role::Caller
        } else {
            Role::Callee
        }
    }

    pub fn is_caller(self) -> bool {
        matches!(self, Role::Caller)
    }
}
