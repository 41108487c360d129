// vextchat entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the chat session
// 4. Build the relay
// 5. Create mpsc channels
// 6. Spawn app logic task
// 7. Run the TUI until the user quits
// 8. Cleanup on exit

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};
use vextchat_app::app;
use vextchat_core::config;
use vextchat_core::session::ChatSession;
use vextchat_relay::Relay;
use vextchat_tui::tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_dir = config::base_dir().context("failed to resolve base directory")?;

    // 1. Initialize tracing (log to file, not terminal)
    init_tracing(&base_dir)?;
    info!("vextchat starting up");

    // 2. Load config, seeding config/ from defaults/ on first run
    let copied = config::ensure_config_files(&base_dir).context("failed to prepare config files")?;
    for path in &copied {
        info!("Copied default config to {}", path.display());
    }
    let config = config::load_config_from(&base_dir).context("failed to load configuration")?;
    info!(
        base_url = %config.relay.base_url,
        environment = %config.relay.environment,
        source = config.credentials.source.label(),
        "Config loaded"
    );

    // 3. Open the chat session
    let session = ChatSession::open(&config);

    // 4. Build the relay
    let relay = Relay::from_config(&config.relay).context("failed to build relay")?;

    // 5. Create mpsc channels
    let (relay_tx, relay_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let app_state = app::AppState::new(&config, session, relay, relay_tx);

    // 6. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        match app::run(relay_rx, cmd_rx, ui_tx, app_state).await {
            Ok(transcript) => info!(turns = transcript.len(), "Session ended"),
            Err(e) => error!("Application loop error: {}", e),
        }
    });

    // 7. Run the TUI (blocks until the user quits)
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {:#}", e);
    }

    // 8. Cleanup: wait for the app task to close the session
    if tokio::time::timeout(Duration::from_secs(5), app_handle)
        .await
        .is_err()
    {
        error!("Application loop did not shut down in time");
    }

    info!("vextchat shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_dir.join("vextchat.log"))
        .context("failed to create log file")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vextchat=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
