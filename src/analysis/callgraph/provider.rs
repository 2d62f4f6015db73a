//! The call-graph capability consumed by lowering.
//!
//! Lowering does not build call graphs itself. It asks a [`CallGraphProvider`] for the
//! module's functions and raw call edges, derives its own snapshot from them
//! ([`CallGraphIndex`](crate::analysis::callgraph::CallGraphIndex)), and later uses the
//! provider again to revalidate call-site handles that may have gone stale.

use crate::ir::{CallSiteId, CallTarget, FunctionId};

/// A single call instruction observed in a caller's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallEdge {
    /// The function containing the call instruction.
    pub caller: FunctionId,
    /// What the call instruction targets.
    pub target: CallTarget,
    /// Handle of the call instruction.
    pub site: CallSiteId,
}

impl CallEdge {
    /// Creates a new call edge.
    ///
    /// # Arguments
    ///
    /// * `caller` - The function whose body contains the call
    /// * `target` - The call's target
    /// * `site` - The call-site handle
    #[must_use]
    pub const fn new(caller: FunctionId, target: CallTarget, site: CallSiteId) -> Self {
        Self {
            caller,
            target,
            site,
        }
    }

    /// Returns the statically known callee, if the call is direct.
    #[must_use]
    pub const fn callee(&self) -> Option<FunctionId> {
        self.target.function()
    }
}

/// Source of call-graph information for a module.
///
/// Implementations must report every live function exactly once from
/// [`function_ids`](CallGraphProvider::function_ids), in a stable order, and one
/// [`CallEdge`] per call instruction from [`call_edges`](CallGraphProvider::call_edges).
/// Edges involving declarations or indirect targets are reported as they are; filtering them
/// is the consumer's job.
pub trait CallGraphProvider {
    /// Returns an iterator over all live functions, declarations included.
    fn function_ids(&self) -> impl Iterator<Item = FunctionId> + '_;

    /// Returns `true` if `function` exists and has a body.
    fn has_body(&self, function: FunctionId) -> bool;

    /// Returns the name of `function`, if it exists.
    fn function_name(&self, function: FunctionId) -> Option<&str>;

    /// Returns an iterator over every call instruction in every function body.
    fn call_edges(&self) -> impl Iterator<Item = CallEdge> + '_;

    /// Re-resolves a call-site handle against the current state of the module.
    ///
    /// # Returns
    ///
    /// The function the call instruction currently targets, or `None` if the handle is stale
    /// (its instruction was consumed or its enclosing function erased) or the call is
    /// indirect.
    fn current_callee(&self, site: CallSiteId) -> Option<FunctionId>;
}
