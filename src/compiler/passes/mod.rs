//! The passes making up one lowering run.
//!
//! - [`BottomUpInliner`] - single worklist pass over a call-graph snapshot
//! - [`FixpointInliner`] - capped rescan-until-stable fallback
//! - [`DeadPhaseFunctionSweeper`] - removal of phase functions left without users
//!
//! Passes report through a shared [`EventLog`](crate::compiler::EventLog) and the `log` facade;
//! the returned reports only carry what the driver needs to assemble its outcome.

mod fixpoint;
mod inlining;
mod sweep;

pub use fixpoint::FixpointInliner;
pub use inlining::BottomUpInliner;
pub use sweep::{DeadPhaseFunctionSweeper, RemovedFunction};

use crate::{analysis::callgraph::CallGraphProvider, ir::FunctionId};

/// What an inlining pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineReport {
    /// Call sites successfully inlined.
    pub inlined: usize,
    /// Inline attempts the inliner refused.
    pub failed: usize,
    /// Recorded call sites found stale and skipped.
    pub stale: usize,
    /// Functions fully resolved by the pass.
    pub processed: usize,
    /// Functions the pass ran over.
    pub total: usize,
    /// Functions left unresolved, in module order.
    pub unresolved: Vec<FunctionId>,
}

impl InlineReport {
    /// Returns `true` if any call site was inlined.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.inlined > 0
    }
}

/// Human-readable name of a function for log lines and event messages.
pub(crate) fn display_name<P>(provider: &P, function: FunctionId) -> String
where
    P: CallGraphProvider + ?Sized,
{
    provider
        .function_name(function)
        .map_or_else(|| function.to_string(), str::to_string)
}
