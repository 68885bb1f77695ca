mod machine;
mod state;

pub use machine::{CloseReason, Internal, Negotiator, Output};
pub use state::NegotiationState;
