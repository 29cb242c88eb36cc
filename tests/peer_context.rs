use meshwork::network::context::NetworkContext;
use meshwork::network::message::Payload;
use meshwork::network::peer::{Peer, PeerDescriptor, PeerId};
use serde_json::json;

fn local_peer() -> Peer {
    Peer::local(PeerDescriptor::new("alpha", "alpha.example"))
}

fn remote_peer() -> Peer {
    Peer::remote(
        PeerDescriptor::new("beta", "beta.example")
            .with_context(NetworkContext::new("Beta Net"))
            .with_servers(["10.0.0.2:4000"]),
    )
}

#[test]
fn identity_and_role_accessors() {
    let local = local_peer();
    assert_eq!(local.id(), &PeerId::new("alpha"));
    assert_eq!(local.host(), "alpha.example");
    assert!(local.is_local());
    assert!(local.local_state().is_some());
    assert!(local.remote_state().is_none());
    assert!(local.distance().is_none());
    assert!(local.active_connection().is_none());

    let remote = remote_peer();
    assert!(remote.is_remote());
    assert!(remote.local_state().is_none());
    assert_eq!(remote.distance(), Some(1));
    assert_eq!(remote.context().canonical_code(), "beta-net");
}

#[test]
fn distance_is_mutable_only_on_remotes() {
    let remote = remote_peer();
    assert!(remote.set_distance(3));
    assert_eq!(remote.distance(), Some(3));

    let local = local_peer();
    assert!(!local.set_distance(3));
    assert!(local.distance().is_none());
}

#[test]
fn local_context_writes_go_through_the_guard() {
    let local = local_peer();

    {
        let mut guard = local.lock_context().expect("local peer hands out the guard");
        guard.set(Payload::Json(json!({"desk": 1})));
        if let Payload::Json(value) = guard.get_mut() {
            value["desk"] = json!(2);
        }
    }

    match local.context_snapshot() {
        Payload::Json(value) => assert_eq!(value["desk"], json!(2)),
        other => panic!("unexpected context: {:?}", other),
    }
}

#[test]
fn remote_peers_never_hand_out_the_guard() {
    let remote = remote_peer();
    assert!(remote.lock_context().is_none());
}

#[test]
fn snapshots_are_clones_not_views() {
    let local = local_peer();
    {
        let mut guard = local.lock_context().unwrap();
        guard.set(Payload::Text("original".into()));
    }

    // Mutating the snapshot must not leak back into the peer.
    let mut snapshot = local.context_snapshot();
    if let Payload::Text(text) = &mut snapshot {
        text.push_str(" tampered");
    }
    match local.context_snapshot() {
        Payload::Text(text) => assert_eq!(text, "original"),
        other => panic!("unexpected context: {:?}", other),
    }
}

#[test]
fn black_hole_flag_toggles() {
    let remote = Peer::remote(PeerDescriptor::new("beta", "beta.example").black_hole(true));
    assert!(remote.is_black_hole());
    remote.set_black_hole(false);
    assert!(!remote.is_black_hole());
}

#[test]
fn local_listen_addresses_dedupe() {
    let local = local_peer();
    let state = local.local_state().unwrap();
    state.add_listen_addr("0.0.0.0:4000");
    state.add_listen_addr("0.0.0.0:4000");
    state.add_listen_addr("[::]:4000");
    assert_eq!(state.listen_addrs(), vec!["0.0.0.0:4000", "[::]:4000"]);
}

#[test]
fn candidate_lists_are_seeded_from_the_descriptor() {
    let remote = Peer::remote(
        PeerDescriptor::new("beta", "beta.example")
            .with_servers(["10.0.0.2:4000", "10.0.0.3:4000"])
            .with_gateways(["gw.example:9000"]),
    );
    assert_eq!(remote.server_candidates().len(), 2);
    assert_eq!(remote.gateway_candidates().len(), 1);

    // Selection and charging run under one lock hold.
    let picked = remote.next_server().unwrap();
    assert_eq!(picked.address, "10.0.0.2:4000");
    assert_eq!(picked.attempts, 1);
    assert!(remote.note_server_success("10.0.0.2:4000"));
    assert!(remote.server_candidates()[0].succeeded);
}
