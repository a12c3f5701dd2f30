//! `label`, `decay` and `day` commands.
//!
//! All three run the engine's own load path against a synthetic record, so
//! the numbers printed here are the numbers a session would compute.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tracing::debug;

use coherence_core::coherence::{CoherenceEngine, LoadOutcome};
use coherence_core::rollover::RolloverScheduler;
use coherence_core::types::{CoherenceState, CredentialKind, Principal, ProgressRecord};
use coherence_core::Config;

use super::OutputFormat;

/// Principal shape used for a calculation.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct PrincipalArgs {
    /// Treat the principal as holding a durable credential
    #[arg(long, conflicts_with = "admin")]
    pub anchored: bool,

    /// Treat the principal as an admin
    #[arg(long)]
    pub admin: bool,
}

impl PrincipalArgs {
    pub(crate) fn principal(&self) -> Principal {
        if self.admin {
            Principal::admin("cli")
        } else if self.anchored {
            Principal::observer("cli", [CredentialKind::Google])
        } else {
            Principal::anonymous("cli")
        }
    }
}

/// Arguments for `label`
#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Coherence score; clamped to [0, 100]
    #[arg(allow_negative_numbers = true)]
    pub score: f64,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `decay`
#[derive(Args, Debug)]
pub struct DecayArgs {
    /// Stored score
    #[arg(long)]
    pub score: f64,

    /// When the record was last seen (RFC 3339)
    #[arg(long)]
    pub last_seen: DateTime<Utc>,

    /// Evaluation time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,

    #[command(flatten)]
    pub principal: PrincipalArgs,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `day`
#[derive(Args, Debug)]
pub struct DayArgs {
    /// Origin of the day counter (RFC 3339)
    #[arg(long)]
    pub start: DateTime<Utc>,

    /// Day stored in the record
    #[arg(long)]
    pub stored: Option<u32>,

    /// Evaluation time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<DateTime<Utc>>,

    #[command(flatten)]
    pub principal: PrincipalArgs,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct LabelResponse {
    score: f64,
    state: CoherenceState,
    short: &'static str,
}

#[derive(Debug, Serialize)]
struct DecayResponse {
    decay_units: i64,
    score_before: f64,
    score: f64,
    state: CoherenceState,
}

#[derive(Debug, Serialize)]
struct DayResponse {
    calculated_day: u32,
    day: u32,
    origin_shifted: bool,
    day_capped: bool,
    start_date: DateTime<Utc>,
    next_rollover: DateTime<Utc>,
}

/// Execute `label`. Always succeeds.
pub fn label_command(args: LabelArgs) -> i32 {
    let state = CoherenceState::from_score(args.score);
    let response = LabelResponse {
        score: args.score.clamp(0.0, 100.0),
        state,
        short: state.short_name(),
    };
    match args.format {
        OutputFormat::Text => println!("{} ({})", state, state.short_name()),
        OutputFormat::Json => print_json(&response),
    }
    0
}

fn run_load(config: &Config, record: ProgressRecord, principal: Principal, now: DateTime<Utc>) -> (LoadOutcome, ProgressRecord) {
    let mut engine = CoherenceEngine::new(config.engine.clone(), config.rollover.clone(), now);
    let outcome = engine.load(record, principal, now);
    (outcome, engine.snapshot())
}

/// Execute `decay`.
pub fn decay_command(args: DecayArgs, config: &Config) -> i32 {
    let now = args.now.unwrap_or_else(Utc::now);
    let mut record = ProgressRecord::new(args.last_seen, args.score);
    record.last_seen_at = args.last_seen;
    debug!(?record, %now, "decay_command");

    let (outcome, _) = run_load(config, record, args.principal.principal(), now);
    let response = DecayResponse {
        decay_units: outcome.decay_units,
        score_before: outcome.score_before,
        score: outcome.score,
        state: outcome.state,
    };
    match args.format {
        OutputFormat::Text => println!(
            "{:.1} -> {:.1} {} ({} unit(s))",
            response.score_before, response.score, response.state, response.decay_units
        ),
        OutputFormat::Json => print_json(&response),
    }
    0
}

/// Execute `day`.
pub fn day_command(args: DayArgs, config: &Config) -> i32 {
    let now = args.now.unwrap_or_else(Utc::now);
    let mut record = ProgressRecord::new(now, config.engine.initial_score);
    record.start_date = args.start;
    record.day_progress = args.stored.unwrap_or(1);
    debug!(start = %args.start, stored = ?args.stored, %now, "day_command");

    let (outcome, snapshot) = run_load(config, record, args.principal.principal(), now);
    let response = DayResponse {
        calculated_day: outcome.calculated_day,
        day: outcome.day,
        origin_shifted: outcome.origin_shifted,
        day_capped: outcome.day_capped,
        start_date: snapshot.start_date,
        next_rollover: RolloverScheduler::from_origin(snapshot.start_date).next_boundary(now),
    };
    match args.format {
        OutputFormat::Text => {
            println!("Day {} (calculated {})", response.day, response.calculated_day);
            if response.origin_shifted {
                println!("Origin moved back to {}", response.start_date.to_rfc3339());
            }
            if response.day_capped {
                println!("Capped for unanchored identities");
            }
            println!("Next rollover: {}", response.next_rollover.to_rfc3339());
        }
        OutputFormat::Json => print_json(&response),
    }
    0
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize output: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_principal_args_shape() {
        assert!(PrincipalArgs::default().principal().is_anonymous);
        let anchored = PrincipalArgs { anchored: true, admin: false }.principal();
        assert!(anchored.is_anchored());
        let admin = PrincipalArgs { anchored: false, admin: true }.principal();
        assert!(admin.is_admin());
    }

    #[test]
    fn test_load_decays_by_whole_windows() {
        let config = Config::default_config();
        let mut record = ProgressRecord::new(at(10, 0), 80.0);
        record.last_seen_at = at(10, 0);

        let (outcome, _) = run_load(&config, record, Principal::anonymous("cli"), at(10, 13));
        assert_eq!(outcome.decay_units, 2);
        assert_eq!(outcome.score, 70.0);
    }

    #[test]
    fn test_stored_day_ahead_moves_origin() {
        let config = Config::default_config();
        let mut record = ProgressRecord::new(at(10, 9), 100.0);
        record.start_date = at(10, 0);
        record.day_progress = 4;

        let (outcome, snapshot) =
            run_load(&config, record, Principal::observer("cli", [CredentialKind::Apple]), at(10, 9));
        assert_eq!(outcome.calculated_day, 1);
        assert_eq!(outcome.day, 4);
        assert!(outcome.origin_shifted);
        assert_eq!(snapshot.start_date, at(7, 0));
    }

    #[test]
    fn test_commands_exit_zero() {
        let config = Config::default_config();
        assert_eq!(
            label_command(LabelArgs { score: 72.0, format: OutputFormat::Json }),
            0
        );
        let code = day_command(
            DayArgs {
                start: at(1, 0),
                stored: None,
                now: Some(at(10, 9)),
                principal: PrincipalArgs::default(),
                format: OutputFormat::Text,
            },
            &config,
        );
        assert_eq!(code, 0);
    }
}
