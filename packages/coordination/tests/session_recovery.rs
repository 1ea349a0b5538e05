//! Session acquisition and recovery against the in-memory backend.

use std::collections::BTreeMap;
use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use coordination::session::{LOCK_NODE, STATE_NODE};
use coordination::{
    Acquisition, CoordError, Coordinator, MemoryClient, MemoryEnsemble, SessionCoordinator,
    SessionPhase, SessionSnapshot, SESSION_ROOT,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[ctor::ctor]
fn init_logging() {
    test_support::logging::init();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ManagerState {
    player_current_game: BTreeMap<String, i64>,
    player_ui_url: BTreeMap<String, String>,
}

fn peer_known() -> impl std::future::Future<Output = Result<(), CoordError>> {
    ready(Ok(()))
}

async fn claim(coordinator: &SessionCoordinator) -> SessionSnapshot<ManagerState> {
    match coordinator.acquire::<ManagerState, _>(peer_known()).await {
        Ok(Acquisition::Claimed(snapshot)) => snapshot,
        other => panic!("expected a claimed session, got {other:?}"),
    }
}

#[tokio::test]
async fn fresh_session_is_created_and_seeded() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "alpha");

    let snapshot = claim(&sessions).await;

    assert!(!snapshot.recovered);
    assert_eq!(snapshot.session_dir, format!("{SESSION_ROOT}/session-0000000000"));
    assert_eq!(snapshot.state, ManagerState::default());
    assert_eq!(sessions.phase(), SessionPhase::Active);

    let lock = client
        .read(&format!("{}/{LOCK_NODE}", snapshot.session_dir))
        .await
        .unwrap();
    assert_eq!(lock, Some(b"playmaster-alpha".to_vec()));
    let state = client
        .read(&format!("{}/{STATE_NODE}", snapshot.session_dir))
        .await
        .unwrap()
        .unwrap();
    let state: serde_json::Value = serde_json::from_slice(&state).unwrap();
    assert_eq!(state["player_current_game"], json!({}));
}

#[tokio::test]
async fn live_owners_each_get_their_own_session() {
    let ensemble = MemoryEnsemble::new();
    let first = SessionCoordinator::new(Arc::new(ensemble.connect()), "a");
    let second = SessionCoordinator::new(Arc::new(ensemble.connect()), "b");

    let a = claim(&first).await;
    let b = claim(&second).await;

    assert_ne!(a.session_dir, b.session_dir);
    let admin = ensemble.connect();
    assert_eq!(admin.children(SESSION_ROOT).await.unwrap().len(), 2);
}

#[tokio::test]
async fn crashed_owner_state_is_recovered_by_a_peer() {
    let ensemble = MemoryEnsemble::new();
    let crashed: Arc<MemoryClient> = Arc::new(ensemble.connect());
    let owner = SessionCoordinator::new(crashed.clone(), "crashy");
    let original = claim(&owner).await;
    let store = owner.store();

    let mut state = ManagerState::default();
    state.player_current_game.insert("10".into(), 77);
    state.player_current_game.insert("11".into(), 77);
    state
        .player_ui_url
        .insert("10".into(), "http://ui/10".into());
    let board = json!({"play_id": 77, "gametype": "tic-tac-toe", "board": ["X", "", "", "", "O", "", "", "", ""]});

    store.create_game(77, &board).unwrap();
    store.update_play_manager(&state).unwrap();
    store.create_game(78, &json!({"play_id": 78})).unwrap();
    store.remove_game(78).unwrap();
    store.flush().await.unwrap();

    crashed.expire();

    let successor = SessionCoordinator::new(Arc::new(ensemble.connect()), "heir");
    let recovered = claim(&successor).await;

    assert!(recovered.recovered);
    assert_eq!(recovered.session_dir, original.session_dir);
    assert_eq!(recovered.state, state);
    assert_eq!(recovered.games.len(), 1);
    assert_eq!(recovered.games.get("77"), Some(&board));
}

#[tokio::test]
async fn retained_lock_survives_a_suspension() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "steady");
    let snapshot = claim(&sessions).await;

    client.suspend();
    sessions.suspend();
    assert_ne!(sessions.phase(), SessionPhase::Active);
    client.resume();

    let again = sessions
        .acquire::<ManagerState, _>(peer_known())
        .await
        .unwrap();
    assert_eq!(
        again,
        Acquisition::Retained {
            session_dir: snapshot.session_dir
        }
    );
    assert!(sessions.is_active());
}

#[tokio::test]
async fn expired_owner_reclaims_its_own_session_after_reconnecting() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "phoenix");
    let first = claim(&sessions).await;
    let store = sessions.store();
    store
        .update_play_manager(&ManagerState {
            player_current_game: BTreeMap::from([("1".to_string(), 5)]),
            ..ManagerState::default()
        })
        .unwrap();
    store.flush().await.unwrap();

    client.expire();
    client.reconnect();

    let second = claim(&sessions).await;
    assert_eq!(second.session_dir, first.session_dir);
    assert!(second.recovered);
    assert_eq!(second.state.player_current_game.get("1"), Some(&5));
}

#[tokio::test]
async fn writes_issued_while_suspended_land_after_resume() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "patient");
    let snapshot = claim(&sessions).await;
    let store = sessions.store();

    client.suspend();
    store.create_game(5, &json!({"play_id": 5})).unwrap();

    let resumer = client.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        resumer.resume();
    });
    store.flush().await.unwrap();

    let game = client
        .read(&format!("{}/5", snapshot.session_dir))
        .await
        .unwrap();
    assert!(game.is_some());
}

#[tokio::test]
async fn vanished_nodes_are_benign_for_updates_and_removals() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "tidy");
    let snapshot = claim(&sessions).await;
    let store = sessions.store();

    store.update_game(404, &json!({"play_id": 404})).unwrap();
    store.remove_game(404).unwrap();
    store.create_game(9, &json!({"play_id": 9, "v": 1})).unwrap();
    store.create_game(9, &json!({"play_id": 9, "v": 2})).unwrap();
    store.flush().await.unwrap();

    let children = client.children(&snapshot.session_dir).await.unwrap();
    assert_eq!(children, vec!["9", "lock", "play_manager"]);
}

#[tokio::test]
async fn writes_queued_before_an_expiry_never_reach_the_heir_session() {
    let ensemble = MemoryEnsemble::new();
    let client = Arc::new(ensemble.connect());
    let sessions = SessionCoordinator::new(client.clone(), "drifter");
    let snapshot = claim(&sessions).await;
    let store = sessions.store();

    client.suspend();
    store.create_game(6, &json!({"play_id": 6})).unwrap();

    let expiring = client.clone();
    let heir_ensemble = ensemble.clone();
    let takeover = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        expiring.expire();
        let heir = SessionCoordinator::new(Arc::new(heir_ensemble.connect()), "heir");
        let recovered = claim(&heir).await;
        expiring.reconnect();
        (heir, recovered)
    });
    let (_heir, recovered) = takeover.await.unwrap();
    assert_eq!(recovered.session_dir, snapshot.session_dir);

    store.flush().await.unwrap();

    let game = client
        .read(&format!("{}/6", snapshot.session_dir))
        .await
        .unwrap();
    assert_eq!(game, None);
    let lock = client
        .read(&format!("{}/{LOCK_NODE}", snapshot.session_dir))
        .await
        .unwrap();
    assert_eq!(lock, Some(b"playmaster-heir".to_vec()));
}
