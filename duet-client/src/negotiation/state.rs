use serde::Serialize;

/// Lifecycle of one attempt to talk to a stranger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    Idle,
    AwaitingMatch,
    Negotiating,
    Connected,
    Closed,
    Failed,
}

impl NegotiationState {
    pub fn can_transition_to(self, next: NegotiationState) -> bool {
        use NegotiationState::*;

        matches!(
            (self, next),
            (Idle, AwaitingMatch)
                | (AwaitingMatch, Negotiating)
                | (AwaitingMatch, Idle)
                | (Negotiating, Connected)
                | (Negotiating, Closed)
                | (Negotiating, Failed)
                | (Connected, Closed)
                | (Connected, Failed)
                | (Closed, AwaitingMatch)
                | (Failed, Idle)
        )
    }

    /// A partner is assigned and resources may be held.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            NegotiationState::Negotiating | NegotiationState::Connected
        )
    }
}
