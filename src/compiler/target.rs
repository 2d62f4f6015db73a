//! Mutation capabilities a module must offer to be lowered.
//!
//! Together with [`CallGraphProvider`] and [`PhaseAttributes`] these traits form the whole
//! boundary between the lowering engine and the IR it runs on. The engine never touches
//! function bodies itself: splicing is the [`Inliner`]'s job and deletion is the
//! [`FunctionSweep`]'s.

use std::fmt;

use crate::{
    analysis::{callgraph::CallGraphProvider, PhaseAttributes},
    ir::{CallSiteId, FunctionId},
};

/// Outcome of a single inline attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineResult {
    /// The callee's body replaced the call instruction. The call-site handle is consumed.
    Success,
    /// The inliner refused the call site and left the module unchanged.
    Failure(String),
}

impl InlineResult {
    /// Creates a failure with the given reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    /// Returns `true` if the call was inlined.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the reason an inline was refused.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

impl fmt::Display for InlineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// Splices callee bodies into callers.
///
/// Argument substitution, block cloning and attribute propagation all live behind this trait.
pub trait Inliner {
    /// Inlines the call at `site`.
    ///
    /// On [`InlineResult::Success`] the handle is consumed and must not be used again. On
    /// [`InlineResult::Failure`] the module is unchanged.
    fn inline(&mut self, site: CallSiteId) -> InlineResult;
}

/// Use tracking and deletion of functions.
pub trait FunctionSweep {
    /// Iterates over the functions that the body of `function` calls directly or references,
    /// one item per instruction. Repeated uses yield repeated items and self calls yield
    /// `function` itself. A declaration yields nothing.
    fn uses_in(&self, function: FunctionId) -> impl Iterator<Item = FunctionId> + '_;

    /// Deletes `function` from the module.
    ///
    /// # Returns
    ///
    /// `true` if the function existed and was removed.
    fn erase_function(&mut self, function: FunctionId) -> bool;
}

/// Everything the lowering driver needs from a module.
///
/// Implemented automatically for any type providing the four capabilities.
pub trait LoweringTarget: CallGraphProvider + PhaseAttributes + Inliner + FunctionSweep {}

impl<T> LoweringTarget for T where T: CallGraphProvider + PhaseAttributes + Inliner + FunctionSweep
{}
