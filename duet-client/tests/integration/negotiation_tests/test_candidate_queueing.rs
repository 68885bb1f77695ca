use duet_client::NegotiationState;
use duet_core::{ServerEvent, SignalPayload};

use crate::integration::{connected_pair, init_tracing};

#[tokio::test]
async fn test_descriptions_precede_candidates() {
    init_tracing();

    let pair = connected_pair().await;

    // b2 calls a1: each side hears the partner's description before any of
    // the partner's candidates, even though they were found while setting it.
    for (id, description) in [("a1", "offer"), ("b2", "answer")] {
        let kinds: Vec<&'static str> = pair
            .bridge
            .delivered_to(id)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Signal { signal_data } => SignalPayload::decode(signal_data)
                    .ok()
                    .map(|p| p.name()),
                _ => None,
            })
            .collect();
        assert_eq!(kinds.first(), Some(&description), "{id}: {kinds:?}");
        assert!(kinds.contains(&"candidate"), "{id}: {kinds:?}");
        assert_eq!(
            kinds.iter().filter(|k| **k == description).count(),
            1,
            "{id}: {kinds:?}"
        );
    }

    for i in 0..pair.network.peer_count() {
        let peer = pair.network.peer(i);
        let ops = peer.ops();

        assert!(
            !ops.iter().any(|op| op.starts_with("error:")),
            "peer {i}: {ops:?}"
        );
        let remote = ops
            .iter()
            .position(|op| op == "set_remote_description")
            .expect("remote description never set");
        let candidate = ops
            .iter()
            .position(|op| op == "add_ice_candidate")
            .expect("candidate never applied");
        assert!(remote < candidate, "peer {i}: {ops:?}");
        assert_eq!(peer.remote_candidates(), 1);
    }

    assert_eq!(pair.a1.snapshot().state, NegotiationState::Connected);
}
