//! Error taxonomy (spec.md §7) and pretty-printing.
//!
//! Library-internal fallibility is a closed `thiserror` enum, the same split
//! the wider workspace this crate descends from uses: `thiserror` inside the
//! library, `anyhow` at the binary/driver boundary ([`src/bin/z80asmgen.rs`]).

use thiserror::Error;

use crate::ir::{Opcode, TypeTag};

/// The three error classes of spec.md §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// Class 1: no selection ladder rung (and no helper) handles this
    /// opcode/type combination. Not raised while a rung still might decline
    /// in favour of a lower one — only once every rung, including the
    /// Helper Dispatcher fallback, has given up.
    #[error("no code sequence for {op:?} on {ty}")]
    Unsupported { op: Opcode, ty: TypeTag },

    /// Class 2: an internal consistency failure, identified by one of the
    /// short tags the original implementation used (`"sp"`, `"gs"`,
    /// `"gseg"`, `"rega"`, `"lrr"`, `"ccf"`, `"lbrb"`).
    #[error("internal error ({tag}): {detail}")]
    Internal {
        tag: &'static str,
        detail: &'static str,
    },

    /// Class 3: a resource (a helper's encoding range, a free register) was
    /// exhausted.
    #[error("resource exhausted: {what}")]
    ResourceExhausted { what: &'static str },
}

impl CodegenError {
    /// Non-zero stack delta surviving into the epilogue (spec.md §7 tag `"sp"`).
    pub fn unbalanced_stack() -> Self {
        CodegenError::Internal {
            tag: "sp",
            detail: "stack delta nonzero at epilogue",
        }
    }

    /// A node reached the Code Selector with an opcode the rewriter should
    /// have already eliminated (tag `"gs"`, "generate select").
    pub fn unreachable_opcode() -> Self {
        CodegenError::Internal {
            tag: "gs",
            detail: "opcode unreachable after rewrite",
        }
    }

    /// An unknown output segment was requested (tag `"gseg"`).
    pub fn unknown_segment() -> Self {
        CodegenError::Internal {
            tag: "gseg",
            detail: "unknown segment",
        }
    }

    /// A register-variable operation referenced a variable not in the
    /// active set (tag `"rega"`).
    pub fn unknown_register_var() -> Self {
        CodegenError::Internal {
            tag: "rega",
            detail: "register variable not allocated",
        }
    }

    /// A local offset exceeded every `generate_lref` encoding's range (tag
    /// `"lrr"`, "local ref range").
    pub fn local_offset_out_of_range() -> Self {
        CodegenError::ResourceExhausted {
            what: "local offset exceeds helper encoding range",
        }
    }

    /// A condition-code polarity was consumed twice, or consumed when none
    /// was pending (tag `"ccf"`, "condition code flags").
    pub fn stale_condition_code() -> Self {
        CodegenError::Internal {
            tag: "ccf",
            detail: "condition-code polarity already consumed",
        }
    }

    /// A literal/static-data label was referenced before being bound (tag
    /// `"lbrb"`, "label reference before bind").
    pub fn label_not_bound() -> Self {
        CodegenError::Internal {
            tag: "lbrb",
            detail: "label referenced before it was bound",
        }
    }

    /// The short tag identifying this error, for the `"On any internal
    /// error, a short tag on standard error"` behaviour spec.md §7 requires.
    /// `Unsupported`/`ResourceExhausted` don't carry one of the original's
    /// tags, so they fall back to a descriptive stand-in.
    pub fn tag(&self) -> &str {
        match self {
            CodegenError::Internal { tag, .. } => tag,
            CodegenError::Unsupported { .. } => "unsupported",
            CodegenError::ResourceExhausted { .. } => "lrr",
        }
    }
}
