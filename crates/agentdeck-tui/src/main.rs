use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentdeck_core::{load_client_config, ClientConfig, HttpBackend, TurnEnd};
use agentdeck_observability::{
    default_logs_dir, emit_event, init_process_logging, ObservabilityEvent, ProcessKind,
};
use agentdeck_wire::Mode;
use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use serde_json::{json, Map, Value};
use tracing::info;

mod app;
mod headless;
mod text_buffer;
mod tree_view;
mod ui;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "agentdeck")]
#[command(about = "Terminal client for a remote multi-agent coding backend")]
struct Cli {
    /// Agent backend base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Path to a JSON config file.
    #[arg(long, global = true, env = "AGENTDECK_CONFIG")]
    config: Option<PathBuf>,
    /// autonomy, build or plan.
    #[arg(long, global = true)]
    mode: Option<Mode>,
    #[arg(long, global = true)]
    stall_timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a single turn to stdout.
    Run {
        prompt: String,
        /// Use the non-streaming endpoint and print the trace when it is done.
        #[arg(long)]
        once: bool,
    },
    /// Check that the agent backend is reachable.
    Health,
}

fn build_cli_overrides(cli: &Cli) -> Value {
    let mut root = Map::new();
    if let Some(url) = &cli.base_url {
        root.insert("base_url".to_string(), json!(url));
    }
    if let Some(mode) = cli.mode {
        root.insert("default_mode".to_string(), json!(mode));
    }
    if let Some(ms) = cli.stall_timeout_ms {
        root.insert("stream_stall_timeout_ms".to_string(), json!(ms));
    }
    Value::Object(root)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = build_cli_overrides(&cli);
    let config = load_client_config(cli.config.as_deref(), Some(overrides))
        .await
        .context("failed to load agentdeck configuration")?;

    let process = match cli.command {
        Some(_) => ProcessKind::Cli,
        None => ProcessKind::Tui,
    };
    let (_log_guard, log_info) =
        init_process_logging(process, &default_logs_dir(), config.log_retention_days)?;
    emit_event(
        tracing::Level::INFO,
        process,
        ObservabilityEvent {
            event: "logging.initialized",
            component: "main",
            status: Some("ok"),
            detail: Some(&config.base_url),
            ..Default::default()
        },
    );
    info!("agentdeck logging initialized: {:?}", log_info);

    match cli.command {
        Some(Command::Run { prompt, once: true }) => {
            headless::run_once(&config, &prompt, config.default_mode).await
        }
        Some(Command::Run { prompt, once: false }) => {
            let end = headless::run_prompt(&config, &prompt, config.default_mode).await?;
            if end != TurnEnd::Completed {
                anyhow::bail!("turn ended without completing: {}", end.as_str());
            }
            Ok(())
        }
        Some(Command::Health) => headless::check_health(&config).await,
        None => run_tui(&config).await,
    }
}

async fn run_tui(config: &ClientConfig) -> anyhow::Result<()> {
    let backend = Arc::new(HttpBackend::new(config).context("invalid client configuration")?);
    let mut app = App::new(backend.clone(), backend, config);
    app.refresh_tree().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        tracing::error!("TUI exited with error: {:?}", err);
    }
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = app.handle_key_event(key) {
                        app.update(action).await?;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            Some(update) = app.session.next_update(), if app.session.is_active() => {
                app.on_stream_update(update);
            }
            _ = tick.tick() => app.tick(),
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_become_config_overrides() {
        let cli = Cli::parse_from([
            "agentdeck",
            "--base-url",
            "http://10.0.0.2:8000",
            "--mode",
            "plan",
            "run",
            "list files",
        ]);
        assert!(matches!(
            cli.command,
            Some(Command::Run { ref prompt, once: false }) if prompt == "list files"
        ));
        assert_eq!(
            build_cli_overrides(&cli),
            json!({ "base_url": "http://10.0.0.2:8000", "default_mode": "plan" })
        );
    }

    #[test]
    fn run_once_flag_selects_one_shot_chat() {
        let cli = Cli::parse_from(["agentdeck", "run", "--once", "hi"]);
        assert!(matches!(
            cli.command,
            Some(Command::Run { ref prompt, once: true }) if prompt == "hi"
        ));
    }

    #[test]
    fn no_flags_no_overrides() {
        let cli = Cli::parse_from(["agentdeck"]);
        assert!(cli.command.is_none());
        assert_eq!(build_cli_overrides(&cli), json!({}));
    }
}
