// End-to-end tests for the live session view: two clients sharing the
// in-memory backend and the in-process broker, with loopback media and
// scripted speech.

use gd_live::api::MemorySessionApi;
use gd_live::live::{Admission, LiveError, LiveOptions, LiveSession};
use gd_live::mesh::{LoopbackEngine, MediaError};
use gd_live::model::{HostRole, NewSession, Session, SessionStatus, Visibility};
use gd_live::service::{await_admission, JoinOutcome, SessionService};
use gd_live::signaling::LocalBroker;
use gd_live::store::SessionStore;
use gd_live::transcribe::{ScriptedRecognizer, Utterance};
use std::sync::Arc;
use std::time::Duration;

const HOST: &str = "host@x.com";
const GUEST: &str = "b@x.com";

fn draft(waiting_room: bool, host_role: HostRole) -> NewSession {
    NewSession {
        topic: "Remote work".to_string(),
        description: None,
        visibility: Visibility::Private,
        host_email: HOST.to_string(),
        host_role,
        time_limit: 5,
        max_participants: None,
        has_waiting_room: waiting_room,
    }
}

fn client(api: &Arc<MemorySessionApi>) -> Arc<SessionService> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(SessionService::new(
        api.clone(),
        Arc::new(SessionStore::new()),
    ))
}

fn options(session_id: &str, email: &str, name: &str) -> LiveOptions {
    LiveOptions {
        session_id: session_id.to_string(),
        email: email.to_string(),
        display_name: name.to_string(),
        locale: "en-US".to_string(),
    }
}

async fn connect(
    opts: LiveOptions,
    service: Arc<SessionService>,
    broker: &Arc<LocalBroker>,
    engine: Arc<LoopbackEngine>,
    recognizer: Arc<ScriptedRecognizer>,
) -> LiveSession {
    match LiveSession::join(opts, service, broker.clone(), engine, recognizer)
        .await
        .unwrap()
    {
        Admission::Connected(live) => live,
        Admission::Waiting => panic!("unexpectedly held in the waiting room"),
    }
}

/// Poll the live view's cached session until `check` holds.
async fn wait_for_session<F>(live: &LiveSession, what: &str, check: F)
where
    F: Fn(&Session) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(session) = live.session().await {
            if check(&session) {
                return;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_mesh(live: &LiveSession, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if live.mesh().peer_count().await == count {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {} mesh peers", count);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_teardown(live: &LiveSession) {
    let mut ended = live.ended();
    tokio::time::timeout(Duration::from_secs(10), async {
        while !*ended.borrow() {
            ended.changed().await.expect("ended watch dropped");
        }
    })
    .await
    .expect("view never tore down");
}

#[tokio::test]
async fn test_private_session_flows_from_code_join_to_completion() {
    let broker = Arc::new(LocalBroker::new());
    let api = Arc::new(MemorySessionApi::with_broker(broker.clone()));

    let host_service = client(&api);
    let created = host_service
        .create_session(draft(false, HostRole::Participant), Some("Hana"))
        .await
        .unwrap();

    let host_live = connect(
        options(&created.id, HOST, "Hana"),
        host_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(HOST)),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await;

    // Second user joins with the 6-digit code.
    let guest_service = client(&api);
    let (session_id, outcome) = guest_service
        .join_by_code(&created.code, "Bipin", GUEST)
        .await
        .unwrap();
    assert_eq!(outcome, JoinOutcome::Joined);

    let guest_live = connect(
        options(&session_id, GUEST, "Bipin"),
        guest_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(GUEST)),
        Arc::new(ScriptedRecognizer::new(vec![vec![Utterance::finalized(
            "the economy is improving",
        )]])),
    )
    .await;

    // The host's cache learns about the guest over the topic.
    wait_for_session(&host_live, "both participants", |s| {
        s.participants.len() == 2
    })
    .await;

    // The mesh forms: one connection on each side.
    wait_for_mesh(&host_live, 1).await;
    wait_for_mesh(&guest_live, 1).await;

    // Locking starts the countdown.
    let locked = host_live.lock().await.unwrap();
    assert!(locked.is_locked);
    assert_eq!(locked.status, SessionStatus::Live);
    assert!(locked.start_time.is_some());

    wait_for_session(&guest_live, "live status", |s| {
        s.status == SessionStatus::Live
    })
    .await;

    // The guest speaks: local echo on their side, one broadcast line on
    // the host's side.
    let expected = "Bipin: the economy is improving";
    wait_for_session(&host_live, "the guest's line", |s| {
        s.transcript.iter().any(|l| l == expected)
    })
    .await;
    wait_for_session(&guest_live, "the local echo", |s| {
        s.transcript.iter().any(|l| l == expected)
    })
    .await;

    // Exactly once on each side: senders filter their own broadcasts.
    assert_eq!(
        guest_live.session().await.unwrap().transcript,
        vec![expected.to_string()]
    );
    assert_eq!(
        host_live.session().await.unwrap().transcript,
        vec![expected.to_string()]
    );

    // The host ends the session for everyone; the transcript rides along.
    let ended = host_live.end().await.unwrap();
    assert_eq!(ended.status, SessionStatus::Completed);
    assert!(ended.end_time.is_some());
    assert_eq!(ended.transcript, vec![expected.to_string()]);

    wait_for_teardown(&guest_live).await;
    assert_eq!(guest_live.mesh().peer_count().await, 0);
}

#[tokio::test]
async fn test_waiting_room_holds_until_host_admits() {
    let broker = Arc::new(LocalBroker::new());
    let api = Arc::new(MemorySessionApi::with_broker(broker.clone()));

    let host_service = client(&api);
    let created = host_service
        .create_session(draft(true, HostRole::Participant), Some("Hana"))
        .await
        .unwrap();

    let host_live = connect(
        options(&created.id, HOST, "Hana"),
        host_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(HOST)),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await;

    // A non-host joiner is held at the gate.
    let guest_service = client(&api);
    let admission = LiveSession::join(
        options(&created.id, GUEST, "Bipin"),
        guest_service.clone(),
        broker.clone(),
        Arc::new(LoopbackEngine::new(GUEST)),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await
    .unwrap();
    assert!(matches!(admission, Admission::Waiting));

    wait_for_session(&host_live, "the held participant", |s| {
        s.waiting_list.len() == 1
    })
    .await;

    let held_id = host_live.session().await.unwrap().waiting_list[0].id.clone();

    // The held client polls; admission resolves the wait.
    let poller = {
        let service = guest_service.clone();
        let session_id = created.id.clone();
        tokio::spawn(async move { await_admission(&service, &session_id, GUEST).await })
    };

    host_live.admit(&held_id).await.unwrap();
    poller
        .await
        .unwrap()
        .expect("admission poll should resolve");

    // Admitted: entering the live view now connects.
    let guest_live = connect(
        options(&created.id, GUEST, "Bipin"),
        guest_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(GUEST)),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await;

    let session = guest_live.session().await.unwrap();
    assert_eq!(session.participants.len(), 2);
    assert!(session.waiting_list.is_empty());

    guest_live.leave().await;
    host_live.leave().await;
}

#[tokio::test]
async fn test_missing_session_is_a_fatal_error() {
    let broker = Arc::new(LocalBroker::new());
    let api = Arc::new(MemorySessionApi::with_broker(broker.clone()));
    let service = client(&api);

    let result = LiveSession::join(
        options("no-such-session", GUEST, "Bipin"),
        service,
        broker.clone(),
        Arc::new(LoopbackEngine::new(GUEST)),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await;

    assert!(matches!(result, Err(LiveError::SessionNotFound)));
}

#[tokio::test]
async fn test_denied_media_access_is_a_fatal_error() {
    let broker = Arc::new(LocalBroker::new());
    let api = Arc::new(MemorySessionApi::with_broker(broker.clone()));

    let host_service = client(&api);
    let created = host_service
        .create_session(draft(false, HostRole::Participant), Some("Hana"))
        .await
        .unwrap();

    let guest_service = client(&api);
    let result = LiveSession::join(
        options(&created.id, GUEST, "Bipin"),
        guest_service,
        broker.clone(),
        Arc::new(LoopbackEngine::new(GUEST).deny_media()),
        Arc::new(ScriptedRecognizer::new(Vec::new())),
    )
    .await;

    assert!(matches!(
        result,
        Err(LiveError::Media(MediaError::AccessDenied))
    ));
}

#[tokio::test]
async fn test_observer_host_is_excluded_from_the_mesh() {
    let broker = Arc::new(LocalBroker::new());
    let api = Arc::new(MemorySessionApi::with_broker(broker.clone()));

    let host_service = client(&api);
    let created = host_service
        .create_session(draft(false, HostRole::Observer), Some("Hana"))
        .await
        .unwrap();

    let host_recognizer = Arc::new(ScriptedRecognizer::new(Vec::new()));
    let host_live = connect(
        options(&created.id, HOST, "Hana"),
        host_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(HOST)),
        host_recognizer.clone(),
    )
    .await;

    let guest_service = client(&api);
    guest_service
        .join_by_code(&created.code, "Bipin", GUEST)
        .await
        .unwrap();
    let guest_live = connect(
        options(&created.id, GUEST, "Bipin"),
        guest_service.clone(),
        &broker,
        Arc::new(LoopbackEngine::new(GUEST)),
        Arc::new(ScriptedRecognizer::new(vec![vec![Utterance::finalized(
            "opening point",
        )]])),
    )
    .await;

    host_live.lock().await.unwrap();

    // The observer still receives the transcript for the record...
    wait_for_session(&host_live, "the observer's transcript copy", |s| {
        s.transcript.iter().any(|l| l == "Bipin: opening point")
    })
    .await;

    // ...but never enters the media mesh, and never captures speech.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(host_live.mesh().peer_count().await, 0);
    assert_eq!(guest_live.mesh().peer_count().await, 0);
    assert_eq!(host_recognizer.start_count(), 0);

    guest_live.leave().await;
    host_live.leave().await;
}
