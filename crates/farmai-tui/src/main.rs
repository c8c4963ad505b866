// FarmAI entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config (seeding defaults on first run)
// 3. Open the database and the farm store
// 4. Build the model client
// 5. Create mpsc channels
// 6. Spawn app logic task
// 7. Run the TUI until the user quits
// 8. Cleanup on exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use farmai_app::app::{self, AppState};
use farmai_app::route::Route;
use farmai_core::config;
use farmai_core::store::{open_farm_store, SqliteStore, StateStore};
use farmai_llm::LlmClient;

#[derive(Debug, Parser)]
#[command(name = "farmai", about = "Terminal assistant for farm consulting visits")]
struct Cli {
    /// Screen to open first, as a path such as `/consulting/<farm-id>/diagnosis`.
    #[arg(long, default_value = "/")]
    route: String,

    /// Directory holding `config/` (defaults to the current directory when it
    /// has one, otherwise the per-user config directory).
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let initial = Route::parse(&cli.route)
        .with_context(|| format!("invalid --route `{}`", cli.route))?;

    // 1. Initialize tracing
    init_tracing()?;
    info!("FarmAI starting up");

    // 2. Load config
    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => config::resolve_base_dir().context("failed to resolve config directory")?,
    };
    let config = config::load_config_in(&base_dir).context("failed to load configuration")?;
    info!("Config loaded from {}", config.base_dir.display());

    // 3. Open database and farm store
    let db = Arc::new(SqliteStore::open(&config.db_path()).context("failed to open database")?);
    info!("Database opened at {}", config.db_path());
    let store = open_farm_store(&config, Arc::clone(&db)).context("failed to open farm store")?;
    let state_store = StateStore::new(db);

    // 4. Model client
    let llm_client = LlmClient::from_config(&config);
    match llm_client.model() {
        Some(model) => info!("LLM client initialized (model {model})"),
        None => info!("LLM client disabled (no API key); reports will use placeholders"),
    }

    // 5. Channels
    let (llm_tx, llm_rx) = mpsc::channel(256);
    let (task_tx, task_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let app_state = AppState::new(
        config,
        store,
        state_store,
        Arc::new(llm_client),
        llm_tx,
        task_tx,
    );

    // 6. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, llm_rx, task_rx, ui_tx, app_state, initial).await {
            error!("Application loop error: {e:#}");
        }
    });

    // 7. Run the TUI; returns when the user quits
    if let Err(e) = farmai_tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {e:#}");
    }

    // 8. Wait for the app task to finish (with timeout)
    if tokio::time::timeout(std::time::Duration::from_secs(5), app_handle)
        .await
        .is_err()
    {
        error!("application task did not stop within 5s");
    }

    info!("FarmAI shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("farmai.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("farmai=info,farmai_tui=info,farmai_app=info,farmai_core=info,farmai_llm=info,warn")
        }))
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
