use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use session_probe::reconcile::spawn_reconciler;
use session_probe::store::{FileStore, MemoryStore};
use session_probe::{HttpIdentityApi, ProbeConfig, ProbeError, ProfileUpdate, SessionPhase, SessionProbe};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
    #[error("nothing to update; pass --username and/or --avatar")]
    EmptyProfileUpdate,
}

#[derive(Parser, Debug)]
#[command(name = "session-probe", about = "Cookly session state from the command line")]
struct Cli {
    #[arg(long, env = "SESSION_PROBE_BASE_URL")]
    base_url: Option<String>,

    /// Raw `Cookie` header value, e.g. `session=abc123`.
    #[arg(long, env = "SESSION_PROBE_COOKIE")]
    session_cookie: Option<String>,

    /// Directory holding the persistent fallback and like cache.
    #[arg(long, env = "SESSION_PROBE_STATE_DIR", default_value = ".session-probe")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current session snapshot.
    Check {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Bootstrap, then keep reconciling and print every phase change.
    Watch,
    /// End the session and clear local caches.
    Logout,
    /// Change username and/or avatar.
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ProbeConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    let api = HttpIdentityApi::new(&config, cli.session_cookie.as_deref())?;
    let probe = Arc::new(SessionProbe::new(
        Arc::new(api),
        Arc::new(FileStore::new(cli.state_dir)),
        Arc::new(MemoryStore::new()),
        config,
    ));

    let result = match cli.command {
        Command::Check { force } => run_check(&probe, force).await,
        Command::Watch => run_watch(probe).await,
        Command::Logout => run_logout(&probe).await,
        Command::Profile { username, avatar } => run_profile(&probe, ProfileUpdate { username, avatar }).await,
    };

    if let Err(CliError::Probe(e)) = &result {
        if e.retryable() {
            tracing::warn!(error = %e, "backend temporarily unavailable; try again shortly");
        }
    }
    result
}

async fn run_check(probe: &SessionProbe, force: bool) -> Result<(), CliError> {
    match probe.get_session(force).await {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("unknown"),
    }
    Ok(())
}

async fn run_logout(probe: &SessionProbe) -> Result<(), CliError> {
    probe.logout().await?;
    println!("logged out");
    Ok(())
}

async fn run_profile(probe: &SessionProbe, update: ProfileUpdate) -> Result<(), CliError> {
    if update.username.is_none() && update.avatar.is_none() {
        return Err(CliError::EmptyProfileUpdate);
    }
    let snapshot = probe.update_profile(&update).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_watch(probe: Arc<SessionProbe>) -> Result<(), CliError> {
    let mut phases = probe.subscribe();
    let printer = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let line = describe(&phases.borrow_and_update());
            println!("{line}");
        }
    });

    probe.bootstrap().await;
    let reconciler = spawn_reconciler(probe.clone());

    tokio::signal::ctrl_c().await?;
    reconciler.abort();
    printer.abort();
    Ok(())
}

fn describe(phase: &SessionPhase) -> String {
    let name = phase.display_name().unwrap_or("-");
    match phase {
        SessionPhase::Unresolved => "unresolved".to_owned(),
        SessionPhase::Optimistic(_) => format!("optimistic signed_in={} user={name}", phase.shows_signed_in()),
        SessionPhase::Authoritative(_) => format!("authoritative signed_in={} user={name}", phase.shows_signed_in()),
    }
}
