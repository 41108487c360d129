// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the TUI with
// relay completions. Owns the chat session and pushes UI updates to the TUI
// render loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vextchat_core::config::Config;
use vextchat_core::credentials::{CredentialBundle, CredentialSource};
use vextchat_core::protocol::{RelayStatus, SessionSnapshot, UiUpdate, UserCommand};
use vextchat_core::session::ChatSession;
use vextchat_core::transcript::{ChatTurn, Transcript};
use vextchat_relay::{Relay, RelayResult};

/// Shown when a message is submitted while a reply is outstanding.
pub const BUSY_NOTICE: &str = "Still waiting for the previous reply.";

/// Shown when the credential form is submitted but credentials come from the
/// secret store.
pub const CREDENTIALS_LOCKED_NOTICE: &str =
    "Credentials come from the secret store; edit config/credentials.toml instead.";

// ---------------------------------------------------------------------------
// RelayEvent
// ---------------------------------------------------------------------------

/// Completion of a spawned relay call.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayEvent {
    pub result: RelayResult,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub session: ChatSession,
    /// Shared with spawned relay tasks.
    pub relay: Arc<Relay>,
    /// Spawned relay tasks report back through a clone of this sender.
    pub relay_tx: mpsc::Sender<RelayEvent>,
    pub current_relay_task: Option<JoinHandle<()>>,
    pub relay_status: RelayStatus,
    pub title: String,
    pub generate_channel_token: bool,
}

impl AppState {
    pub fn new(
        config: &Config,
        session: ChatSession,
        relay: Relay,
        relay_tx: mpsc::Sender<RelayEvent>,
    ) -> Self {
        AppState {
            session,
            relay: Arc::new(relay),
            relay_tx,
            current_relay_task: None,
            relay_status: RelayStatus::Idle,
            title: config.ui.title.clone(),
            generate_channel_token: config.credentials.generate_channel_token,
        }
    }

    pub fn build_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id.clone(),
            title: self.title.clone(),
            environment: self.session.environment.clone(),
            credentials: self.session.credential_summary(),
            relay_status: self.relay_status,
            turn_count: self.session.transcript().len(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.relay_status == RelayStatus::Pending
    }

    /// Spawn one relay call for `message` with the current credentials. The
    /// result comes back on `relay_tx`.
    fn spawn_relay_call(&mut self, message: String) {
        let relay = Arc::clone(&self.relay);
        let credentials = self.session.credentials().clone();
        let environment = self.session.environment.clone();
        let tx = self.relay_tx.clone();

        self.current_relay_task = Some(tokio::spawn(async move {
            let result = relay.send_with_env(&message, &credentials, &environment).await;
            if tx.send(RelayEvent { result }).await.is_err() {
                debug!("relay event receiver dropped before the reply arrived");
            }
        }));
        self.relay_status = RelayStatus::Pending;
    }

    pub fn cancel_relay_task(&mut self) {
        if let Some(handle) = self.current_relay_task.take() {
            if !handle.is_finished() {
                handle.abort();
                info!("Cancelled in-flight relay call");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Relay completions from spawned tasks
/// 2. User commands from the TUI
///
/// Pushes UI updates through `ui_tx`. On exit any in-flight call is
/// cancelled and the session is closed; its final transcript is returned.
pub async fn run(
    mut relay_rx: mpsc::Receiver<RelayEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<Transcript> {
    info!(session_id = %state.session.id, "Application event loop started");

    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
        .await;

    loop {
        tokio::select! {
            // --- Relay completions ---
            // `state` holds a sender, so this channel never closes while we run.
            Some(event) = relay_rx.recv() => {
                handle_relay_event(&mut state, event, &ui_tx).await;
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    state.cancel_relay_task();
    let transcript = state.session.close();
    info!("Application event loop exiting");
    Ok(transcript)
}

/// Record a finished relay call as the assistant turn.
async fn handle_relay_event(
    state: &mut AppState,
    event: RelayEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    state.current_relay_task = None;
    state.relay_status = RelayStatus::Idle;

    if let Some(failure) = event.result.failure() {
        debug!(kind = ?failure.kind, status = ?failure.status_code, "relay call returned a failure");
    }

    let turn = state
        .session
        .transcript_mut()
        .push_assistant(event.result.to_reply_text())
        .clone();
    publish_turn(state, turn, ui_tx).await;
    let _ = ui_tx.send(UiUpdate::RelayStatus(RelayStatus::Idle)).await;
}

async fn publish_turn(state: &AppState, turn: ChatTurn, ui_tx: &mpsc::Sender<UiUpdate>) {
    debug!(
        role = turn.role.as_str(),
        turns = state.session.transcript().len(),
        "Turn appended"
    );
    let _ = ui_tx.send(UiUpdate::TurnAppended(turn)).await;
}

/// Handle a user command from the TUI.
async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::SendMessage(text) => {
            if text.trim().is_empty() {
                debug!("Ignoring blank message");
                return;
            }
            if state.is_busy() {
                info!("Message rejected, a relay call is already in flight");
                let _ = ui_tx.send(UiUpdate::Notice(BUSY_NOTICE.to_string())).await;
                return;
            }

            let turn = state.session.transcript_mut().push_user(text.as_str()).clone();
            publish_turn(state, turn, ui_tx).await;

            state.spawn_relay_call(text);
            let _ = ui_tx.send(UiUpdate::RelayStatus(RelayStatus::Pending)).await;
        }
        UserCommand::SetCredentials(bundle) => {
            apply_credentials(state, bundle, ui_tx).await;
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

async fn apply_credentials(
    state: &mut AppState,
    bundle: CredentialBundle,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if state.session.source != CredentialSource::Interactive {
        warn!(source = state.session.source.label(), "Ignoring credential form submission");
        let _ = ui_tx
            .send(UiUpdate::Notice(CREDENTIALS_LOCKED_NOTICE.to_string()))
            .await;
        return;
    }

    state
        .session
        .set_credentials(bundle, state.generate_channel_token);

    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(state.build_snapshot())))
        .await;
    let notice = if state.session.credentials().is_complete() {
        "Credentials saved."
    } else {
        "Credentials saved, but some fields are still empty."
    };
    let _ = ui_tx.send(UiUpdate::Notice(notice.to_string())).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use vextchat_core::config::{CredentialsConfig, RelayConfig, SecretsConfig, UiConfig};
    use vextchat_core::transcript::Role;
    use vextchat_relay::{OutboundRequest, Transport, TransportError, TransportResponse};

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    /// Echoes the payload back as `{"response": "echo: <payload>"}` after an
    /// optional delay, recording each request.
    struct EchoTransport {
        delay: Duration,
        calls: Mutex<Vec<OutboundRequest>>,
    }

    impl EchoTransport {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(EchoTransport {
                delay,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn post_json(
            &self,
            request: OutboundRequest,
        ) -> Result<TransportResponse, TransportError> {
            let payload = request.body["payload"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let body = echo_body(&format!("echo: {payload}"));
            Ok(TransportResponse::new(200, body))
        }
    }

    fn echo_body(response: &str) -> String {
        format!("{{\"response\":\"{response}\"}}")
    }

    fn test_config(source: CredentialSource) -> Config {
        Config {
            relay: RelayConfig::default(),
            credentials: CredentialsConfig {
                source,
                generate_channel_token: true,
            },
            ui: UiConfig::default(),
            secrets: SecretsConfig {
                api_key: Some("key".into()),
                channel_token: Some("chan".into()),
                endpoint_id: Some("ep".into()),
            },
        }
    }

    fn test_state(
        source: CredentialSource,
        transport: Arc<EchoTransport>,
    ) -> (AppState, mpsc::Receiver<RelayEvent>) {
        let config = test_config(source);
        let session = ChatSession::open_with_env(&config, |_| None);
        let relay = Relay::from_config_with_transport(&config.relay, transport).unwrap();
        let (relay_tx, relay_rx) = mpsc::channel(16);
        (AppState::new(&config, session, relay, relay_tx), relay_rx)
    }

    async fn next_turn(ui_rx: &mut mpsc::Receiver<UiUpdate>) -> vextchat_core::transcript::ChatTurn {
        loop {
            match ui_rx.recv().await {
                Some(UiUpdate::TurnAppended(turn)) => return turn,
                Some(_) => continue,
                None => panic!("ui channel closed before a turn arrived"),
            }
        }
    }

    async fn next_notice(ui_rx: &mut mpsc::Receiver<UiUpdate>) -> String {
        loop {
            match ui_rx.recv().await {
                Some(UiUpdate::Notice(text)) => return text,
                Some(_) => continue,
                None => panic!("ui channel closed before a notice arrived"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // AppState
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn snapshot_reflects_session() {
        let (state, _rx) = test_state(CredentialSource::SecretStore, EchoTransport::new(Duration::ZERO));
        let snapshot = state.build_snapshot();
        assert_eq!(snapshot.session_id, state.session.id);
        assert_eq!(snapshot.environment, "dev");
        assert_eq!(snapshot.relay_status, RelayStatus::Idle);
        assert_eq!(snapshot.turn_count, 0);
        assert!(snapshot.credentials.is_complete());
    }

    // -----------------------------------------------------------------------
    // handle_user_command / handle_relay_event
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn send_message_appends_user_turn_and_marks_pending() {
        let transport = EchoTransport::new(Duration::ZERO);
        let (mut state, mut relay_rx) = test_state(CredentialSource::SecretStore, transport.clone());
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SendMessage("hello".into()), &ui_tx).await;

        assert!(state.is_busy());
        assert_eq!(state.session.transcript().len(), 1);
        let turn = next_turn(&mut ui_rx).await;
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "hello");

        let event = relay_rx.recv().await.unwrap();
        assert_eq!(event.result, RelayResult::success("echo: hello"));
        assert_eq!(transport.call_count(), 1);

        handle_relay_event(&mut state, event, &ui_tx).await;
        assert!(!state.is_busy());
        assert!(state.current_relay_task.is_none());
        let turn = next_turn(&mut ui_rx).await;
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "echo: hello");
        assert!(state.session.transcript().is_alternating());
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let transport = EchoTransport::new(Duration::ZERO);
        let (mut state, _relay_rx) = test_state(CredentialSource::SecretStore, transport.clone());
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SendMessage("   ".into()), &ui_tx).await;

        assert!(!state.is_busy());
        assert!(state.session.transcript().is_empty());
        assert!(ui_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_message_while_pending_is_rejected() {
        let transport = EchoTransport::new(Duration::from_secs(60));
        let (mut state, _relay_rx) = test_state(CredentialSource::SecretStore, transport.clone());
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SendMessage("first".into()), &ui_tx).await;
        handle_user_command(&mut state, UserCommand::SendMessage("second".into()), &ui_tx).await;

        assert_eq!(next_notice(&mut ui_rx).await, BUSY_NOTICE);
        assert_eq!(state.session.transcript().len(), 1);
        state.cancel_relay_task();
    }

    #[tokio::test]
    async fn failure_is_recorded_as_assistant_turn() {
        let (mut state, _relay_rx) = test_state(CredentialSource::Interactive, EchoTransport::new(Duration::ZERO));
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        let result = Relay::from_config_with_transport(
            &RelayConfig::default(),
            EchoTransport::new(Duration::ZERO),
        )
        .unwrap()
        .send("hi", &CredentialBundle::default())
        .await;

        state.session.transcript_mut().push_user("hi");
        handle_relay_event(&mut state, RelayEvent { result }, &ui_tx).await;

        let turn = next_turn(&mut ui_rx).await;
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "❌ Error: Missing API credentials.");
    }

    #[tokio::test]
    async fn interactive_credentials_are_applied() {
        let (mut state, _relay_rx) = test_state(CredentialSource::Interactive, EchoTransport::new(Duration::ZERO));
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        assert!(!state.session.credentials().is_complete());

        handle_user_command(
            &mut state,
            UserCommand::SetCredentials(CredentialBundle::new("k", "", "e")),
            &ui_tx,
        )
        .await;

        // Channel token generated because generate_channel_token is on.
        assert!(state.session.credentials().is_complete());
        match ui_rx.recv().await {
            Some(UiUpdate::Snapshot(snapshot)) => assert!(snapshot.credentials.is_complete()),
            other => panic!("expected snapshot, got {other:?}"),
        }
        assert_eq!(next_notice(&mut ui_rx).await, "Credentials saved.");
    }

    #[tokio::test]
    async fn secret_store_credentials_cannot_be_overwritten() {
        let (mut state, _relay_rx) = test_state(CredentialSource::SecretStore, EchoTransport::new(Duration::ZERO));
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(
            &mut state,
            UserCommand::SetCredentials(CredentialBundle::new("other", "x", "y")),
            &ui_tx,
        )
        .await;

        assert_eq!(state.session.credentials().api_key, "key");
        assert_eq!(next_notice(&mut ui_rx).await, CREDENTIALS_LOCKED_NOTICE);
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn run_sends_initial_snapshot_and_returns_transcript_on_quit() {
        let (state, relay_rx) = test_state(CredentialSource::SecretStore, EchoTransport::new(Duration::ZERO));
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ui_tx, mut ui_rx) = mpsc::channel(64);

        let handle = tokio::spawn(run(relay_rx, cmd_rx, ui_tx, state));

        assert!(matches!(ui_rx.recv().await, Some(UiUpdate::Snapshot(_))));

        cmd_tx.send(UserCommand::SendMessage("ping".into())).await.unwrap();
        next_turn(&mut ui_rx).await;
        let reply = next_turn(&mut ui_rx).await;
        assert_eq!(reply.content, "echo: ping");

        cmd_tx.send(UserCommand::Quit).await.unwrap();
        let transcript = handle.await.unwrap().unwrap();
        assert_eq!(transcript.len(), 2);
        assert!(transcript.is_alternating());
    }

    #[tokio::test]
    async fn run_exits_when_command_channel_closes() {
        let (state, relay_rx) = test_state(CredentialSource::Interactive, EchoTransport::new(Duration::ZERO));
        let (cmd_tx, cmd_rx) = mpsc::channel::<UserCommand>(1);
        let (ui_tx, _ui_rx) = mpsc::channel(16);

        drop(cmd_tx);
        let transcript = run(relay_rx, cmd_rx, ui_tx, state).await.unwrap();
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn quit_while_pending_cancels_the_call() {
        let transport = EchoTransport::new(Duration::from_secs(60));
        let (state, relay_rx) = test_state(CredentialSource::SecretStore, transport.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ui_tx, mut ui_rx) = mpsc::channel(64);

        let handle = tokio::spawn(run(relay_rx, cmd_rx, ui_tx, state));
        cmd_tx.send(UserCommand::SendMessage("slow".into())).await.unwrap();
        next_turn(&mut ui_rx).await;
        cmd_tx.send(UserCommand::Quit).await.unwrap();

        let transcript = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run should exit promptly")
            .unwrap()
            .unwrap();
        // Only the user turn made it in before teardown.
        assert_eq!(transcript.len(), 1);
    }
}
