/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: One counted-down session with persistent history and graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tempo_timer::cue::TerminalBell;
use tempo_timer::display::TerminalTitle;
use tempo_timer::model::next_task_kind;
use tempo_timer::{
    CountdownCoordinator, Orchestrator, StateStorage, Task, TaskAction, TaskKind, TaskState,
    TimerConfig, TimerEvent,
};

#[derive(Parser, Debug)]
#[command(name = "tempo-timer", version, about = "Pomodoro countdown timer with persistent session history")]
struct Cli {
    /// Optional YAML config with session durations
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Session kind; omitted, the cycle history picks focus or a break
    #[arg(long = "kind", value_enum)]
    kind: Option<SessionKind>,
    /// Override the configured duration
    #[arg(long = "minutes", value_name = "MINUTES")]
    minutes: Option<u64>,
    /// Label recorded with the session
    #[arg(long = "label", default_value = "focus session")]
    label: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SessionKind {
    Focus,
    ShortBreak,
    LongBreak,
}

impl From<SessionKind> for TaskKind {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Focus => TaskKind::Focus,
            SessionKind::ShortBreak => TaskKind::ShortBreak,
            SessionKind::LongBreak => TaskKind::LongBreak,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = load_config(args.config_path.as_deref())?;
    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let storage = StateStorage::new().await.context("open state storage")?;
    let state = storage.load_or_initial().await;
    info!(
        recorded_tasks = state.tasks.len(),
        current_cycle = state.current_cycle,
        "state loaded"
    );

    let kind = args.kind.map(TaskKind::from).unwrap_or_else(|| pick_kind(&state, &config));
    let duration_secs = match args.minutes {
        Some(0) => return Err(anyhow!("--minutes must be greater than zero")),
        Some(minutes) => minutes.saturating_mul(60),
        None => config.duration_secs(kind),
    };
    let task = Task::new(args.label, kind, duration_secs);
    info!(kind = ?kind, duration_secs, "starting session");

    let coordinator = CountdownCoordinator::new().context("create countdown coordinator")?;
    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let orchestrator = Orchestrator::new(
        state,
        storage,
        coordinator,
        Box::new(TerminalTitle),
        Box::new(TerminalBell),
        shutdown,
    );

    let events = orchestrator.event_sender();
    events
        .send(TimerEvent::Dispatch(TaskAction::Start(task)))
        .map_err(|_| anyhow!("orchestrator event channel closed"))?;

    let final_state = orchestrator.run().await.context("run orchestrator")?;

    match final_state.tasks.last() {
        Some(task) if task.completed_at.is_some() => {
            let next = next_task_kind(final_state.current_cycle, config.cycles_per_long_break);
            info!(
                current_cycle = final_state.current_cycle,
                suggested_next = ?next,
                "session completed"
            );
        }
        Some(_) => info!("session interrupted"),
        None => {}
    }

    Ok(())
}

/// Pick the session kind from the cycle history: after a completed focus
/// session the matching break is due, otherwise focus.
fn pick_kind(state: &TaskState, config: &TimerConfig) -> TaskKind {
    match state.tasks.last() {
        Some(task) if task.kind == TaskKind::Focus && task.completed_at.is_some() => {
            next_task_kind(state.current_cycle, config.cycles_per_long_break)
        }
        _ => TaskKind::Focus,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TimerConfig> {
    let Some(path) = path else {
        return Ok(TimerConfig::default());
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    TimerConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
