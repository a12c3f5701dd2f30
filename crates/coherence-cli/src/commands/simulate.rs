//! `simulate`: run a full coherence session against in-memory backends.
//!
//! Establishes a session, prints every engine event as it happens and tears
//! down (with a final flush) when the duration elapses or on Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use coherence_core::identity::{FileIdentityStore, IdentitySession};
use coherence_core::stubs::{
    InMemoryIdentityStore, InMemoryMigrationChannel, InMemoryProgressStore,
    InMemoryRecoveryChannel, StubAuthGateway,
};
use coherence_core::traits::LocalIdentityStore;
use coherence_core::types::{Principal, ProgressRecord, RecordKey};
use coherence_core::{
    Clock, CoherenceSession, Config, CoreResult, EngineEvent, SessionDeps, SystemClock,
};

use super::inspect::PrincipalArgs;
use super::OutputFormat;
use crate::error::{exit_code_for_error, CliExitCode};

/// Arguments for `simulate`
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Run time in seconds
    #[arg(long, default_value_t = 60)]
    pub duration_secs: u64,

    /// Seed the record with this score instead of creating a fresh one
    #[arg(long)]
    pub score: Option<f64>,

    /// Hours since the seeded record was last seen
    #[arg(long, default_value_t = 0, requires = "score")]
    pub away_hours: i64,

    /// Persist the visitor identity here. Falls back to `identity.storage_dir`.
    #[arg(long)]
    pub identity_dir: Option<PathBuf>,

    #[command(flatten)]
    pub principal: PrincipalArgs,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

struct Backend {
    store: Arc<InMemoryProgressStore>,
    deps: SessionDeps,
}

fn backend(args: &SimulateArgs, config: &Config) -> Backend {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryProgressStore::with_clock(clock.clone()));
    let auth = Arc::new(StubAuthGateway::new());
    if args.principal.admin {
        auth.set_current(Some(Principal::admin("sim-admin")));
    } else if args.principal.anchored {
        auth.set_current(Some(args.principal.principal()));
    }

    let local: Arc<dyn LocalIdentityStore> = match args
        .identity_dir
        .clone()
        .or_else(|| config.identity.storage_dir.clone())
    {
        Some(dir) => Arc::new(FileIdentityStore::new(dir)),
        None => Arc::new(InMemoryIdentityStore::new()),
    };

    let deps = SessionDeps {
        store: store.clone(),
        auth,
        local,
        migration: Arc::new(InMemoryMigrationChannel::new()),
        recovery: Arc::new(InMemoryRecoveryChannel::with_clock(clock.clone())),
        clock,
    };
    Backend { store, deps }
}

/// Seed the record the session will load so decay is visible.
fn seed(args: &SimulateArgs, config: &Config, backend: &Backend) -> CoreResult<()> {
    let Some(score) = args.score else {
        return Ok(());
    };
    let principal = if args.principal.admin {
        Principal::admin("sim-admin")
    } else {
        args.principal.principal()
    };
    let identity =
        IdentitySession::new(backend.deps.local.clone(), config.identity.storage_key.clone())
            .get_or_create()?;
    let key = RecordKey::resolve(&principal, &identity);

    let last_seen = backend.deps.clock.now() - ChronoDuration::hours(args.away_hours);
    let mut record = ProgressRecord::new(last_seen, score);
    record.last_seen_at = last_seen;
    backend.store.seed(key.collection, &key.id, record);
    debug!(key = %key, score, away_hours = args.away_hours, "Seeded record");
    Ok(())
}

/// Execute `simulate`.
///
/// # Exit Codes
/// - 0: session ran and tore down
/// - 1: establish failed (recoverable)
/// - 2: corrupt local identity or internal error
pub async fn simulate_command(args: SimulateArgs, config: Config) -> i32 {
    match run(args, config).await {
        Ok(()) => CliExitCode::Success.into(),
        Err(e) => {
            warn!(error = %e, "simulate failed");
            eprintln!("Error: {}", e);
            exit_code_for_error(&e).into()
        }
    }
}

async fn run(args: SimulateArgs, config: Config) -> CoreResult<()> {
    let backend = backend(&args, &config);
    seed(&args, &config, &backend)?;

    let session = CoherenceSession::new(config, backend.deps.clone())?;
    let mut events = session.subscribe();
    let established = session.establish().await?;

    match args.format {
        OutputFormat::Text => println!(
            "Established {} as {} | score {:.1} {} | day {}{}",
            established.key,
            established.principal.uid,
            established.load.score,
            established.load.state,
            established.load.day,
            if established.created { " (new)" } else { "" }
        ),
        OutputFormat::Json => print_json(&serde_json::json!({
            "event": "established",
            "key": established.key.to_string(),
            "uid": established.principal.uid,
            "visitor_id": established.identity.visitor_id,
            "created": established.created,
            "decay_units": established.load.decay_units,
            "score": established.load.score,
            "state": established.load.state,
            "day": established.load.day,
        })),
    }

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("simulation duration elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => print_event(&event, args.format),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event subscriber lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let flushed = session.shutdown().await;
    let snapshot = session.snapshot();
    match args.format {
        OutputFormat::Text => println!(
            "Shut down | score {:.1} {} | day {} | final flush {}",
            snapshot.coherence_score,
            snapshot.coherence_state,
            snapshot.day_progress,
            if flushed { "ok" } else { "failed" }
        ),
        OutputFormat::Json => print_json(&serde_json::json!({
            "event": "shutdown",
            "flushed": flushed,
            "score": snapshot.coherence_score,
            "state": snapshot.coherence_state,
            "day": snapshot.day_progress,
        })),
    }
    Ok(())
}

fn print_event(event: &EngineEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(event) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to serialize event: {}", e),
        },
        OutputFormat::Text => match event {
            EngineEvent::StateChanged(t) => {
                println!("state  {} -> {} at {:.1}", t.from, t.to, t.score)
            }
            EngineEvent::DayAdvanced { day, bonus_applied } => {
                println!("day    {} (+{:.1})", day, bonus_applied)
            }
            EngineEvent::IdentityReplaced {
                previous_visitor_id,
                visitor_id,
            } => println!("ident  {} -> {}", previous_visitor_id, visitor_id),
            EngineEvent::AnchorHealed { is_anchored } => {
                println!("anchor healed (anchored={})", is_anchored)
            }
            EngineEvent::Flushed {
                trigger,
                score,
                state,
                day,
            } => println!("flush  [{}] score {:.1} {} day {}", trigger, score, state, day),
            EngineEvent::FlushFailed { trigger, error } => {
                println!("flush  [{}] FAILED: {}", trigger, error)
            }
        },
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", value);
}
