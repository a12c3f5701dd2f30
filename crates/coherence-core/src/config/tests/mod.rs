//! Tests for configuration loading and validation.
