use meshwork::config::OverlayConfig;
use meshwork::errors::OverlayError;
use meshwork::network::context::{ContextMatchRule, NetworkContext};
use meshwork::network::message::{
    Envelope, JsonLineFormat, Payload, PendingDeliveries, Priority, SendOutcome,
};
use meshwork::network::observer::NullObserver;
use meshwork::network::overlay::Overlay;
use meshwork::network::peer::{PeerDescriptor, PeerId};
use meshwork::network::relation::RelationEdge;
use meshwork::network::transport::split_stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

async fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let mut waited = 0u32;
    while !check() {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
        assert!(waited < 250, "timed out waiting: {}", what);
    }
}

fn id(s: &str) -> PeerId {
    PeerId::new(s)
}

fn overlay() -> Overlay {
    Overlay::with_collaborators(
        &OverlayConfig::default(),
        PeerDescriptor::new("alpha", "alpha.example").with_context(NetworkContext::new("net")),
        Arc::new(JsonLineFormat),
        Arc::new(ContextMatchRule),
    )
}

#[tokio::test]
async fn registration_rejects_duplicates_and_the_local_id() {
    let overlay = overlay();
    assert_eq!(overlay.peer_count(), 0);

    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();
    assert_eq!(overlay.peer_count(), 1);
    assert_eq!(overlay.peer_ids(), vec![id("beta")]);

    let dup = overlay.register_peer(PeerDescriptor::new("beta", "elsewhere.example"));
    assert!(matches!(dup, Err(OverlayError::DuplicatePeer(p)) if p == id("beta")));

    let own = overlay.register_peer(PeerDescriptor::new("alpha", "alpha.example"));
    assert!(matches!(own, Err(OverlayError::DuplicatePeer(_))));

    assert!(overlay.remove_peer(&id("beta")).is_some());
    assert!(overlay.remove_peer(&id("beta")).is_none());
    assert_eq!(overlay.peer_count(), 0);
}

#[tokio::test]
async fn attaching_a_connection_raises_the_local_edge() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    let (near, far) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = split_stream(near);
    let conn = overlay
        .attach_connection(&id("beta"), reader, writer, Arc::new(NullObserver))
        .await
        .unwrap();
    assert!(conn.is_connected());
    assert!(overlay.active_connection(&id("beta")).is_some());

    // The authoritative local edge flips and the neighborhood resolves.
    let neighborhood = overlay.neighborhood();
    assert_eq!(neighborhood.len(), 1);
    assert_eq!(neighborhood[0].id(), &id("beta"));
    assert_eq!(overlay.peer(&id("beta")).unwrap().distance(), Some(1));

    // Frames queued through the container reach the stream.
    let env = Envelope::datagram(id("alpha"), id("beta"), Payload::Text("ping".into()));
    overlay.send_to(&id("beta"), env.clone(), Priority::UserData).unwrap();

    let (far_read, _far_write) = tokio::io::split(far);
    let mut far_read = BufReader::new(far_read);
    let tag = far_read.read_u8().await.unwrap();
    assert_eq!(tag, 0x00);
    let mut line = String::new();
    far_read.read_line(&mut line).await.unwrap();
    let seen: Envelope = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(seen.id, env.id);
}

#[tokio::test]
async fn attaching_an_already_dead_stream_settles_disconnected() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    // The far end is gone before the attach: the teardown can fire before
    // the connection lands in the peer's slot.
    let (near, far) = tokio::io::duplex(1024);
    drop(far);
    let (reader, writer) = split_stream(near);
    let conn = overlay
        .attach_connection(&id("beta"), reader, writer, Arc::new(NullObserver))
        .await
        .unwrap();

    wait_for("the dead link to settle", || {
        !conn.is_connected()
            && overlay.active_connection(&id("beta")).is_none()
            && overlay.neighborhood().is_empty()
    })
    .await;

    // No stale connected edge survives either path of the race.
    let local = overlay.local().clone();
    if let Some(edge) = local.relations().get(&id("beta")).cloned() {
        assert!(!edge.connected);
    };
}

#[tokio::test]
async fn sending_needs_a_registered_connected_peer() {
    let overlay = overlay();
    let env = Envelope::datagram(id("alpha"), id("ghost"), Payload::Text("?".into()));

    let unknown = overlay.send_to(&id("ghost"), env.clone(), Priority::UserData);
    assert!(matches!(unknown, Err(OverlayError::NotConnected(_))));

    overlay
        .register_peer(PeerDescriptor::new("ghost", "ghost.example"))
        .unwrap();
    let offline = overlay.send_tracked_to(&id("ghost"), env, Priority::UserData);
    assert!(matches!(offline, Err(OverlayError::NotConnected(_))));
}

#[tokio::test]
async fn connect_peer_without_candidates_reports_no_endpoint() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    let result = overlay.connect_peer(&id("beta"), Arc::new(NullObserver)).await;
    assert!(matches!(result, Err(OverlayError::NoEndpoint(p)) if p == id("beta")));

    let unknown = overlay.connect_peer(&id("ghost"), Arc::new(NullObserver)).await;
    assert!(matches!(unknown, Err(OverlayError::UnknownPeer(_))));
}

#[tokio::test]
async fn dropping_a_connection_fails_the_backlog_and_clears_foreign_state() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    // Capacity 1 wedges the first frame so it is still queued at teardown.
    let (near, _far) = tokio::io::duplex(1);
    let (reader, writer) = split_stream(near);
    overlay
        .attach_connection(&id("beta"), reader, writer, Arc::new(NullObserver))
        .await
        .unwrap();

    // Beta's own slice fills from gossip before the link dies.
    assert!(overlay.merge_relation(&RelationEdge {
        owner: id("beta"),
        other: id("gamma"),
        connected: true,
        state_id: 4,
    }));

    let pending = PendingDeliveries::new();
    let env = Envelope::reliable(id("alpha"), id("beta"), Payload::Text("doomed".into()));
    let waiter = pending.register(env.id);
    overlay.send_to(&id("beta"), env, Priority::UserData).unwrap();

    overlay.drop_connection(&id("beta"), &pending).await.unwrap();

    assert_eq!(waiter.await.unwrap(), SendOutcome::Failed);
    assert!(overlay.active_connection(&id("beta")).is_none());
    assert!(overlay.neighborhood().is_empty());

    let beta = overlay.peer(&id("beta")).unwrap();
    // Foreign clear: beta's declarations are unknowable without beta.
    assert!(beta.relations().is_empty());
    // The local edge survives as a versioned disconnect marker.
    let local = overlay.local().clone();
    let edge = local.relations().get(&id("beta")).cloned().unwrap();
    assert!(!edge.connected);

    // A second drop is an error, not a double teardown.
    let again = overlay.drop_connection(&id("beta"), &pending).await;
    assert!(matches!(again, Err(OverlayError::NotConnected(_))));
}

#[tokio::test]
async fn gossip_ingest_skips_own_and_unknown_owners() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    // Echoes of the local peer's own beliefs never apply.
    assert!(!overlay.merge_relation(&RelationEdge {
        owner: id("alpha"),
        other: id("beta"),
        connected: true,
        state_id: 99,
    }));
    assert!(overlay.local().relations().is_empty());

    // Unknown owners are dropped wire input.
    assert!(!overlay.merge_relation(&RelationEdge {
        owner: id("ghost"),
        other: id("beta"),
        connected: true,
        state_id: 1,
    }));

    let edges = vec![
        RelationEdge {
            owner: id("beta"),
            other: id("gamma"),
            connected: true,
            state_id: 2,
        },
        RelationEdge {
            owner: id("beta"),
            other: id("gamma"),
            connected: false,
            state_id: 1, // stale, ignored
        },
    ];
    assert_eq!(overlay.merge_relations(&edges), 1);
    let beta = overlay.peer(&id("beta")).unwrap();
    assert!(beta.relations().get(&id("gamma")).unwrap().connected);
}

#[tokio::test]
async fn export_filters_by_context_and_black_hole() {
    let overlay = overlay();
    overlay
        .register_peer(
            PeerDescriptor::new("beta", "beta.example").with_context(NetworkContext::new("net")),
        )
        .unwrap();
    overlay
        .register_peer(
            PeerDescriptor::new("gamma", "gamma.example")
                .with_context(NetworkContext::new("isolated")),
        )
        .unwrap();

    overlay.set_relation(&id("alpha"), &id("beta"), true);
    overlay.set_relation(&id("alpha"), &id("gamma"), true);

    // Only the in-context edge crosses toward "net".
    let toward_net = overlay
        .export_relations(&id("alpha"), &NetworkContext::new("net"))
        .unwrap();
    assert_eq!(toward_net.len(), 1);
    assert_eq!(toward_net[0].other, id("beta"));

    // A black-holed owner exports nothing at all.
    overlay.local().set_black_hole(true);
    let hidden = overlay
        .export_relations(&id("alpha"), &NetworkContext::new("net"))
        .unwrap();
    assert!(hidden.is_empty());

    let unknown = overlay.export_relations(&id("ghost"), &NetworkContext::new("net"));
    assert!(matches!(unknown, Err(OverlayError::UnknownPeer(_))));
}

#[tokio::test]
#[should_panic(expected = "unregistered peer")]
async fn authoritative_writes_for_unknown_owners_fail_fast() {
    let overlay = overlay();
    overlay.set_relation(&id("ghost"), &id("alpha"), true);
}

#[tokio::test]
async fn context_updates_flow_through_the_guard_and_the_protocol() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    overlay.update_local_context(|payload| {
        *payload = Payload::Text("room 12".into());
    });
    match overlay.local().context_snapshot() {
        Payload::Text(text) => assert_eq!(text, "room 12"),
        other => panic!("unexpected context: {:?}", other),
    }

    overlay
        .apply_peer_context(&id("beta"), Payload::Text("remote desk".into()))
        .unwrap();
    match overlay.peer(&id("beta")).unwrap().context_snapshot() {
        Payload::Text(text) => assert_eq!(text, "remote desk"),
        other => panic!("unexpected context: {:?}", other),
    }

    let unknown = overlay.apply_peer_context(&id("ghost"), Payload::Text("?".into()));
    assert!(matches!(unknown, Err(OverlayError::UnknownPeer(_))));
}

#[tokio::test]
async fn going_offline_tombstones_the_local_slice() {
    let overlay = overlay();
    overlay
        .register_peer(PeerDescriptor::new("beta", "beta.example"))
        .unwrap();

    let (near, _far) = tokio::io::duplex(1024);
    let (reader, writer) = split_stream(near);
    overlay
        .attach_connection(&id("beta"), reader, writer, Arc::new(NullObserver))
        .await
        .unwrap();
    assert_eq!(overlay.neighborhood().len(), 1);

    let pending = PendingDeliveries::new();
    overlay.go_offline(&pending).await;

    assert!(overlay.active_connection(&id("beta")).is_none());
    assert!(overlay.neighborhood().is_empty());
    // The edge is kept, disconnected and re-versioned, so the change can
    // win later merges elsewhere.
    let local = overlay.local().clone();
    let edge = local.relations().get(&id("beta")).cloned().unwrap();
    assert!(!edge.connected);
    assert!(edge.state_id >= 2);
}
