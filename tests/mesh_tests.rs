// Integration tests for the full-mesh peer manager, driven through the
// in-process broker and the loopback media engine.

use gd_live::mesh::{LoopbackEngine, MediaEngine, PeerConnection, PeerMesh, PeerState};
use gd_live::signaling::{LocalBroker, SignalEnvelope, SignalKind, Signaling, TopicEvent};
use std::sync::Arc;
use std::time::Duration;

const SESSION: &str = "session-1";

/// A mesh participant wired to the broker, with a pump task feeding
/// inbound signals to the mesh the way the live view's signal loop does.
async fn spawn_peer(
    broker: &Arc<LocalBroker>,
    email: &str,
    candidates: usize,
) -> (Arc<PeerMesh>, Arc<LoopbackEngine>) {
    let engine = Arc::new(LoopbackEngine::new(email).with_candidates(candidates));
    let engine_dyn: Arc<dyn MediaEngine> = engine.clone();

    let channel = broker.open(SESSION).await.unwrap();
    let mut events = channel.subscribe().await.unwrap();

    let mesh = Arc::new(PeerMesh::new(SESSION, email, engine_dyn, channel));

    let pump_mesh = mesh.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let TopicEvent::Signal(signal) = event {
                pump_mesh.handle_signal(&signal).await;
            }
        }
    });

    (mesh, engine)
}

async fn wait_for_peers(mesh: &PeerMesh, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if mesh.peer_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer count not reached in time");
}

#[tokio::test]
async fn test_three_participants_form_a_complete_graph() {
    let broker = Arc::new(LocalBroker::new());

    let (mesh_a, _) = spawn_peer(&broker, "a@x.com", 0).await;
    mesh_a.announce_join().await;

    let (mesh_b, _) = spawn_peer(&broker, "b@x.com", 0).await;
    mesh_b.announce_join().await;

    let (mesh_c, _) = spawn_peer(&broker, "c@x.com", 0).await;
    mesh_c.announce_join().await;

    // Every node ends with exactly N-1 = 2 open connections.
    wait_for_peers(&mesh_a, 2).await;
    wait_for_peers(&mesh_b, 2).await;
    wait_for_peers(&mesh_c, 2).await;

    for (mesh, others) in [
        (&mesh_a, ["b@x.com", "c@x.com"]),
        (&mesh_b, ["a@x.com", "c@x.com"]),
        (&mesh_c, ["a@x.com", "b@x.com"]),
    ] {
        let mut peers = mesh.peers().await;
        peers.sort();
        assert_eq!(peers, others);
        for other in others {
            assert_eq!(mesh.peer_state(other).await, Some(PeerState::Connected));
        }
    }
}

#[tokio::test]
async fn test_duplicate_join_reuses_the_connection() {
    let broker = Arc::new(LocalBroker::new());

    let (mesh_a, engine_a) = spawn_peer(&broker, "a@x.com", 0).await;
    mesh_a.announce_join().await;

    let (mesh_b, _) = spawn_peer(&broker, "b@x.com", 0).await;
    mesh_b.announce_join().await;

    wait_for_peers(&mesh_a, 1).await;

    // A second join broadcast for an already-connected peer must not
    // create a second connection or a duplicate offer.
    mesh_b.announce_join().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(mesh_a.peer_count().await, 1);
    assert_eq!(engine_a.connections().len(), 1);
}

#[tokio::test]
async fn test_leave_closes_and_removes_the_connection() {
    let broker = Arc::new(LocalBroker::new());

    let (mesh_a, engine_a) = spawn_peer(&broker, "a@x.com", 0).await;
    mesh_a.announce_join().await;

    let (mesh_b, _) = spawn_peer(&broker, "b@x.com", 0).await;
    mesh_b.announce_join().await;

    wait_for_peers(&mesh_a, 1).await;

    mesh_b.announce_leave().await;

    wait_for_peers(&mesh_a, 0).await;
    assert_eq!(engine_a.connections()[0].state(), PeerState::Closed);
}

#[tokio::test]
async fn test_early_candidates_are_queued_and_replayed() {
    let broker = Arc::new(LocalBroker::new());

    // Drive the mesh directly, no pump: we control message order.
    let engine = Arc::new(LoopbackEngine::new("a@x.com"));
    let engine_dyn: Arc<dyn MediaEngine> = engine.clone();
    let channel = broker.open(SESSION).await.unwrap();
    let mesh = PeerMesh::new(SESSION, "a@x.com", engine_dyn, channel);

    // B joins; we offer, so our connection has no remote description yet.
    mesh.handle_signal(&SignalEnvelope::broadcast(
        SignalKind::Join,
        "b@x.com",
        SESSION,
        String::new(),
    ))
    .await;

    // B's candidate arrives before B's answer.
    mesh.handle_signal(&SignalEnvelope::directed(
        SignalKind::Candidate,
        "b@x.com",
        "a@x.com",
        SESSION,
        "cand-early".to_string(),
    ))
    .await;

    assert_eq!(mesh.pending_candidates("b@x.com").await, 1);
    assert!(engine.connections()[0].applied_candidates().is_empty());

    // The answer sets the remote description and replays the queue.
    mesh.handle_signal(&SignalEnvelope::directed(
        SignalKind::Answer,
        "b@x.com",
        "a@x.com",
        SESSION,
        "answer:b->a".to_string(),
    ))
    .await;

    assert_eq!(mesh.pending_candidates("b@x.com").await, 0);
    let applied = engine.connections()[0].applied_candidates();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, "cand-early");
}

#[tokio::test]
async fn test_candidate_for_unknown_peer_is_dropped() {
    let broker = Arc::new(LocalBroker::new());
    let engine: Arc<dyn MediaEngine> = Arc::new(LoopbackEngine::new("a@x.com"));
    let channel = broker.open(SESSION).await.unwrap();
    let mesh = PeerMesh::new(SESSION, "a@x.com", engine, channel);

    mesh.handle_signal(&SignalEnvelope::directed(
        SignalKind::Candidate,
        "stranger@x.com",
        "a@x.com",
        SESSION,
        "cand".to_string(),
    ))
    .await;

    assert_eq!(mesh.peer_count().await, 0);
}

#[tokio::test]
async fn test_self_originated_signals_are_ignored() {
    let broker = Arc::new(LocalBroker::new());
    let engine: Arc<dyn MediaEngine> = Arc::new(LoopbackEngine::new("a@x.com"));
    let channel = broker.open(SESSION).await.unwrap();
    let mesh = PeerMesh::new(SESSION, "a@x.com", engine, channel);

    mesh.handle_signal(&SignalEnvelope::broadcast(
        SignalKind::Join,
        "a@x.com",
        SESSION,
        String::new(),
    ))
    .await;

    assert_eq!(mesh.peer_count().await, 0);
}

#[tokio::test]
async fn test_offer_is_answered_toward_the_sender() {
    let broker = Arc::new(LocalBroker::new());

    let engine: Arc<dyn MediaEngine> = Arc::new(LoopbackEngine::new("b@x.com"));
    let channel = broker.open(SESSION).await.unwrap();
    // Observe what the mesh publishes.
    let mut events = channel.subscribe().await.unwrap();

    let mesh = PeerMesh::new(SESSION, "b@x.com", engine, channel);

    mesh.handle_signal(&SignalEnvelope::directed(
        SignalKind::Offer,
        "a@x.com",
        "b@x.com",
        SESSION,
        "offer:a->b".to_string(),
    ))
    .await;

    let answer = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if let TopicEvent::Signal(signal) = event {
                if signal.kind == SignalKind::Answer {
                    return signal;
                }
            }
        }
        panic!("channel closed without an answer");
    })
    .await
    .expect("no answer published");

    assert_eq!(answer.receiver.as_deref(), Some("a@x.com"));
    assert_eq!(mesh.peer_state("a@x.com").await, Some(PeerState::Connected));
}

#[tokio::test]
async fn test_local_candidates_are_forwarded_to_the_peer() {
    let broker = Arc::new(LocalBroker::new());

    let engine: Arc<dyn MediaEngine> =
        Arc::new(LoopbackEngine::new("a@x.com").with_candidates(2));
    let channel = broker.open(SESSION).await.unwrap();
    let mut events = channel.subscribe().await.unwrap();

    let mesh = PeerMesh::new(SESSION, "a@x.com", engine, channel);

    mesh.handle_signal(&SignalEnvelope::broadcast(
        SignalKind::Join,
        "b@x.com",
        SESSION,
        String::new(),
    ))
    .await;

    let mut forwarded = 0;
    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if let TopicEvent::Signal(signal) = event {
                if signal.kind == SignalKind::Candidate {
                    assert_eq!(signal.receiver.as_deref(), Some("b@x.com"));
                    forwarded += 1;
                    if forwarded == 2 {
                        break;
                    }
                }
            }
        }
    })
    .await;

    assert_eq!(forwarded, 2);
}
