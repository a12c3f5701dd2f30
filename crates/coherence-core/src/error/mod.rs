//! Error types for coherence-core.
//!
//! This module defines the error hierarchy used throughout the engine:
//!
//! - [`CoreError`]: Top-level error for all crate operations
//! - Sub-error types: [`StoreError`], [`AuthError`], [`RecoveryError`]
//!
//! Library code never panics on these paths; everything returns
//! [`CoreResult`] and is propagated with `?`.
//!
//! # Examples
//!
//! ```rust
//! use coherence_core::error::{CoreError, CoreResult, StoreError};
//!
//! fn flush() -> CoreResult<()> {
//!     Err(StoreError::Unavailable("offline".to_string()).into())
//! }
//!
//! let err = flush().unwrap_err();
//! assert!(matches!(err, CoreError::Store(StoreError::Unavailable(_))));
//! assert!(err.is_recoverable());
//! ```

mod conversions;
mod sub_errors;
mod unified;


pub use sub_errors::{AuthError, RecoveryError, StoreError};
pub use unified::{CoreError, CoreResult};
