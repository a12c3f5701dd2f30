//! CLI exit code handling.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Recoverable error (retry, fix input, bring the store back)
//! - 2: Blocking failure (corrupt local state, internal error)

use std::process::ExitCode;

use coherence_core::error::{RecoveryError, StoreError};
use coherence_core::CoreError;

/// Exit codes for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliExitCode {
    /// Success
    Success = 0,
    /// Recoverable error, does not indicate damaged state
    Warning = 1,
    /// Blocking failure. Only for corruption and bugs.
    Blocking = 2,
}

impl From<CliExitCode> for ExitCode {
    fn from(code: CliExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

impl From<&CoreError> for CliExitCode {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::SerializationError(_)
            | CoreError::Internal(_)
            | CoreError::Store(StoreError::Serialization(_)) => CliExitCode::Blocking,
            CoreError::Store(StoreError::ReadFailed(msg)) if is_corruption_indicator(msg) => {
                CliExitCode::Blocking
            }

            CoreError::Store(_)
            | CoreError::Auth(_)
            | CoreError::Recovery(_)
            | CoreError::PermissionDenied { .. }
            | CoreError::NotEstablished
            | CoreError::ConfigError(_)
            | CoreError::ValidationError { .. } => CliExitCode::Warning,
        }
    }
}

/// Check if an error message indicates corruption.
#[inline]
pub fn is_corruption_indicator(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    CORRUPTION_INDICATORS
        .iter()
        .any(|&indicator| lower.contains(indicator))
}

/// Corruption indicator strings (lowercase).
const CORRUPTION_INDICATORS: &[&str] = &[
    "corruption",
    "corrupted",
    "checksum",
    "malformed",
    "truncated",
];

/// Exit code for any error, preferring the typed conversion.
pub fn exit_code_for_error(e: &(dyn std::error::Error + 'static)) -> CliExitCode {
    if let Some(core) = e.downcast_ref::<CoreError>() {
        return CliExitCode::from(core);
    }

    if is_corruption_indicator(&e.to_string()) {
        CliExitCode::Blocking
    } else {
        CliExitCode::Warning
    }
}
