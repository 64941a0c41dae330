//! Core error types for steplog-core.
//!
//! Uses `thiserror` for structured, matchable error variants. The trace model
//! itself never fails; these errors cover parsing of caller-supplied
//! configuration values such as palette colors.

use thiserror::Error;

/// Core errors produced by the steplog-core crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A color literal could not be parsed as `#rrggbb` or `rgb(r, g, b)`.
    #[error("invalid color literal: '{literal}'")]
    InvalidColor { literal: String },
}
