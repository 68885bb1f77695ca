use duet_client::NegotiationState;
use duet_client::SessionEvent;
use duet_client::negotiation::CloseReason;
use std::time::Duration;

use crate::integration::{connected_pair, init_tracing, wait_state};

#[tokio::test]
async fn test_ice_failure_closes_both_sides() {
    init_tracing();

    let pair = connected_pair().await;
    let mut a1_events = pair.a1.subscribe();
    let mut b2_events = pair.b2.subscribe();

    pair.network.peer(0).drop_connectivity();

    wait_state(&pair.a1, NegotiationState::Closed).await;
    wait_state(&pair.b2, NegotiationState::Closed).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut reasons = Vec::new();
    for events in [&mut a1_events, &mut b2_events] {
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Closed(reason) = event {
                reasons.push(reason);
            }
        }
    }
    reasons.sort_by_key(|r| format!("{r:?}"));

    assert_eq!(
        reasons,
        vec![CloseReason::PartnerLeft, CloseReason::PeerDisconnected]
    );

    let lobby = pair.bridge.lobby().snapshot().await.expect("lobby closed");
    assert!(lobby.pairs.is_empty());
}
