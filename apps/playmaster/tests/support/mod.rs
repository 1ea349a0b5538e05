#![allow(dead_code)]

use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordination::{Acquisition, MemoryClient, MemoryEnsemble, SessionCoordinator};
use parking_lot::Mutex;
use playmaster::games::RuleBook;
use playmaster::services::{
    GameHost, GamemasterClient, PlayManagerState, ReportError, UiNotifier,
};
use protocol::{CreatePlayRequest, HostOwnership, PlayId, PlayResultReport, PlayerId};
use serde_json::Value;
use test_support::scripted::Script;

pub const SELF_URL: &str = "http://10.0.0.9:8001/playmaster/";

#[ctor::ctor]
fn init_logging() {
    test_support::logging::init();
}

pub struct ScriptedGamemaster {
    pub results: Script<PlayResultReport, Result<(), ReportError>>,
    pub ownership: Script<HostOwnership, Result<(), ReportError>>,
}

impl ScriptedGamemaster {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            results: Script::new(Ok(())),
            ownership: Script::new(Ok(())),
        })
    }
}

#[async_trait]
impl GamemasterClient for ScriptedGamemaster {
    async fn report_result(&self, report: &PlayResultReport) -> Result<(), ReportError> {
        self.results.respond(*report)
    }

    async fn report_host_ownership(&self, ownership: &HostOwnership) -> Result<(), ReportError> {
        self.ownership.respond(ownership.clone())
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub updates: Mutex<Vec<(String, Value, Option<String>)>>,
}

#[async_trait]
impl UiNotifier for RecordingUi {
    async fn notify(&self, ui_url: &str, update: &Value, authorization: Option<&str>) {
        self.updates.lock().push((
            ui_url.to_string(),
            update.clone(),
            authorization.map(str::to_owned),
        ));
    }
}

pub struct Harness {
    pub ensemble: MemoryEnsemble,
    pub client: Arc<MemoryClient>,
    pub session: Arc<SessionCoordinator>,
    pub host: Arc<GameHost>,
    pub gamemaster: Arc<ScriptedGamemaster>,
    pub ui: Arc<RecordingUi>,
}

/// A host on `ensemble` that has not acquired a session yet.
pub fn idle_host(ensemble: &MemoryEnsemble, name: &str) -> Harness {
    let client = Arc::new(ensemble.connect());
    let session = Arc::new(SessionCoordinator::new(client.clone(), name));
    let gamemaster = ScriptedGamemaster::accepting();
    let ui = Arc::new(RecordingUi::default());
    let host = Arc::new(GameHost::new(
        session.clone(),
        RuleBook::default(),
        gamemaster.clone(),
        ui.clone(),
        SELF_URL,
    ));
    Harness {
        ensemble: ensemble.clone(),
        client,
        session,
        host,
        gamemaster,
        ui,
    }
}

/// Claims a session and loads it, as the session runner does.
pub async fn activate(harness: &Harness) -> Vec<PlayId> {
    match harness
        .session
        .acquire::<PlayManagerState, _>(ready(Ok(())))
        .await
        .unwrap()
    {
        Acquisition::Claimed(snapshot) => harness.host.load(snapshot).unwrap(),
        Acquisition::Retained { .. } => harness.host.hosted_plays(),
    }
}

pub async fn active_host() -> Harness {
    let harness = idle_host(&MemoryEnsemble::new(), "test");
    activate(&harness).await;
    harness
}

pub fn create_request(play_id: PlayId, p1: PlayerId, p2: PlayerId) -> CreatePlayRequest {
    CreatePlayRequest {
        play_id,
        player1_id: p1,
        player2_id: p2,
        player1_username: Some(format!("p{p1}")),
        player2_username: Some(format!("p{p2}")),
        tournament_id: None,
        phase: None,
        player1_ui_url: Some(format!("http://ui-{p1}/")),
        player2_ui_url: Some(format!("http://ui-{p2}/")),
    }
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
