//! Structural misuse diagnostics.
//!
//! A [`Misuse`] describes a gap in the narrated state: an operation needed a
//! current method, step or open block that did not exist, or an error arrived
//! without a backtrace. Misuse never fails the caller. The recorder logs it,
//! forwards it to the renderer, keeps it for inspection, and carries on with a
//! placeholder.

use serde::Serialize;
use steplog_core::LogicKind;

/// A reported, non-fatal structural inconsistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum Misuse {
    /// A step was added before any method.
    #[error("step '{step}' added with no current method; attributed to no method")]
    NoCurrentMethod { step: String },

    /// An event was added before any step; an implicit step was synthesized.
    #[error("{operation} called with no current step; recorded under an implicit step")]
    NoCurrentStep { operation: &'static str },

    /// A block close with nothing of that kind open.
    #[error("{operation} called with no open {kind} block")]
    NoOpenBlock {
        operation: &'static str,
        kind: LogicKind,
    },

    /// `elseif`/`else` with no `if` on top of the block stack.
    #[error("{operation} called without an open if block")]
    ElseWithoutIf { operation: &'static str },

    /// An inner block was still open when an enclosing one was closed.
    #[error("{kind} block '{description}' was never closed; closed by {operation}")]
    UnclosedBlock {
        kind: LogicKind,
        description: String,
        operation: &'static str,
    },

    /// An error input carried no stack trace.
    #[error("error '{name}' has no stack; frames omitted")]
    MissingStack { name: String },
}
