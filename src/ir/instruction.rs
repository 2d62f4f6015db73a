//! Instructions of the reference function body.
//!
//! The model is deliberately coarse: lowering only cares about where calls are and what they
//! target. Everything else is an [`Instruction::Op`] carrying opaque text.

use std::fmt;

use crate::ir::{CallSiteId, FunctionId};

/// Target of a call instruction.
///
/// Mirrors the distinction the call graph makes between calls it can attribute to a function
/// and calls it cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// Call to a statically known function.
    Direct(FunctionId),
    /// Call through a computed function pointer.
    Indirect,
}

impl CallTarget {
    /// Returns the statically known callee, if any.
    #[must_use]
    pub const fn function(&self) -> Option<FunctionId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Indirect => None,
        }
    }
}

/// A single instruction in a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Any non-call operation. The text is carried through inlining unchanged.
    Op(String),
    /// A call instruction, identified by its call-site handle.
    Call {
        /// Handle of this call instruction.
        site: CallSiteId,
        /// What the instruction calls.
        target: CallTarget,
    },
    /// Takes the address of a function without calling it.
    ///
    /// Counts as a use of the function: a referenced function is never swept, but the
    /// reference is not a call edge either.
    FunctionRef(FunctionId),
    /// Returns from the function. Dropped when the body is spliced into a caller.
    Return,
}

impl Instruction {
    /// Returns the call-site handle if this is a call instruction.
    #[must_use]
    pub const fn call_site(&self) -> Option<CallSiteId> {
        match self {
            Self::Call { site, .. } => Some(*site),
            _ => None,
        }
    }

    /// Returns the function this instruction calls directly or takes the address of.
    #[must_use]
    pub const fn used_function(&self) -> Option<FunctionId> {
        match self {
            Self::Call {
                target: CallTarget::Direct(callee),
                ..
            } => Some(*callee),
            Self::FunctionRef(target) => Some(*target),
            _ => None,
        }
    }

    /// Returns `true` if this instruction uses `function`, either by calling it directly or by
    /// taking its address.
    #[must_use]
    pub fn uses(&self, function: FunctionId) -> bool {
        self.used_function() == Some(function)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(text) => f.write_str(text),
            Self::Call {
                site,
                target: CallTarget::Direct(callee),
            } => write!(f, "call {callee} ; {site}"),
            Self::Call {
                site,
                target: CallTarget::Indirect,
            } => write!(f, "call indirect ; {site}"),
            Self::FunctionRef(target) => write!(f, "ref {target}"),
            Self::Return => f.write_str("ret"),
        }
    }
}
