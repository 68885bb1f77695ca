use crate::integration::{connected_pair, init_tracing};

#[tokio::test]
async fn test_caller_offers_and_callee_answers() {
    init_tracing();

    let pair = connected_pair().await;
    assert_eq!(pair.network.peer_count(), 2);

    let (caller, callee) = {
        let first = pair.network.peer(0);
        let second = pair.network.peer(1);
        if first.ops().contains(&"create_offer".to_owned()) {
            (first, second)
        } else {
            (second, first)
        }
    };

    assert_eq!(
        caller.ops(),
        vec![
            "add_local_audio",
            "create_data_channel:chat",
            "create_offer",
            "set_local_description",
            "set_remote_description",
            "add_ice_candidate",
        ]
    );
    assert_eq!(
        callee.ops(),
        vec![
            "add_local_audio",
            "set_remote_description",
            "create_answer",
            "set_local_description",
            "add_ice_candidate",
        ]
    );
}
