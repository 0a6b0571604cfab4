//! TextPlan compiler: text front end, plan builder and text emitter.
//!
//! This crate provides both directions of the transcoder:
//! - `parser` - lexer, CST, and AST construction
//! - `analyze` - symbol table, reference checks, dependency order
//! - `build` - lowering a resolved file into a [`Plan`]
//! - `emit` - rendering a [`Plan`] back into text
//! - `diagnostics` - error reporting
//!
//! [`Transcoder`] ties them to the wire format in `textplan-wire`.
//!
//! [`Plan`]: textplan_core::Plan

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod analyze;
pub mod build;
pub mod diagnostics;
pub mod emit;
pub mod parser;
mod transcoder;

#[cfg(test)]
mod transcoder_tests;

use textplan_wire::{DecodeError, EncodeError};

/// Result type for passes that produce both output and diagnostics.
///
/// Each pass returns its typed output alongside any diagnostics it collected.
/// Fatal errors (like fuel exhaustion) use the outer `Result`.
pub type PassResult<T> = std::result::Result<(T, Diagnostics), Error>;

pub use build::{BuildError, BuildErrorKind};
pub use diagnostics::{DiagnosticKind, Diagnostics, DiagnosticsPrinter, Severity};
pub use emit::{EmitError, EmitOptions, TextFormat};
pub use transcoder::{
    PlanBytes, Transcoder, load_from_json, load_from_text, save_to_json, save_to_text,
};

/// Errors from either direction of the transcoder, one variant per stage.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Execution fuel exhausted (too many parser operations).
    #[error("execution limit exceeded")]
    ExecFuelExhausted,

    /// Recursion fuel exhausted (input nested too deeply).
    #[error("recursion limit exceeded")]
    RecursionLimitExceeded,

    #[error("input is empty")]
    EmptyInput,

    /// Source text too long for 32-bit spans.
    #[error("input of {len} bytes exceeds the 4 GiB source limit")]
    InputTooLarge { len: usize },

    #[error("parsing failed with {} errors", .0.error_count())]
    Parse(Diagnostics),

    #[error("name resolution failed with {} errors", .0.error_count())]
    Resolve(Diagnostics),

    #[error("plan building failed: {0}")]
    Build(#[from] BuildError),

    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("text emission failed: {0}")]
    Emit(#[from] EmitError),

    /// Malformed JSON, a JSON document that is not a plan, or a plan too
    /// deep for serde_json to read back.
    #[error("json plan: {0}")]
    Json(String),

    /// A length-prefixed buffer whose prefix disagrees with its payload.
    #[error("envelope declares {declared} bytes, found {actual}")]
    Envelope { declared: usize, actual: usize },
}

/// Result type for transcoder operations.
pub type Result<T> = std::result::Result<T, Error>;
