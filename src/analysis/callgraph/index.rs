//! Snapshot index of the call graph used to order inlining.
//!
//! The index is built once per pass from a [`CallGraphProvider`] and is never updated
//! afterwards. It keeps exactly two things:
//!
//! - the number of outgoing calls each function makes to other functions with bodies, and
//! - for each callee, the callers that call it and the handles of those calls.
//!
//! Declarations and indirect calls are left out on both ends. Because the module keeps changing
//! while the index is consumed, every recorded handle has to be revalidated before use.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::callgraph::CallGraphProvider,
    ir::{CallSiteId, FunctionId},
};

/// Statistics about a [`CallGraphIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallGraphIndexStats {
    /// Number of functions with bodies.
    pub function_count: usize,
    /// Number of call edges between functions with bodies.
    pub edge_count: usize,
    /// Number of call edges skipped (declarations, indirect calls, unknown callees).
    pub skipped_edges: usize,
    /// Number of functions making no calls to functions with bodies.
    pub sink_count: usize,
}

/// Out-call counters and callee-to-caller adjacency over functions with bodies.
///
/// # Example
///
/// ```rust
/// use phaselower::{analysis::callgraph::CallGraphIndex, ir::{Function, Module}};
///
/// let mut module = Module::new("m");
/// let leaf = module.add_function(Function::new("leaf"))?;
/// let top = module.add_function(Function::new("top"))?;
/// module.body(leaf)?.ret();
/// module.body(top)?.call(leaf).call(leaf).ret();
///
/// let index = CallGraphIndex::build(&module);
/// assert_eq!(index.pending_out_calls(top), Some(2));
/// assert_eq!(index.pending_out_calls(leaf), Some(0));
/// assert_eq!(index.call_sites(leaf, top).len(), 2);
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallGraphIndex {
    /// Function -> number of its own calls to functions with bodies.
    pending: BTreeMap<FunctionId, usize>,
    /// Callee -> caller -> call-site handles, in body order.
    adjacency: BTreeMap<FunctionId, BTreeMap<FunctionId, Vec<CallSiteId>>>,
    /// Caller -> distinct callees, the forward view of `adjacency`.
    callees: BTreeMap<FunctionId, BTreeSet<FunctionId>>,
    edge_count: usize,
    skipped_edges: usize,
}

impl CallGraphIndex {
    /// Builds the index from a provider.
    ///
    /// Every function with a body starts with a counter of zero. Each call edge whose caller and
    /// callee both have bodies increments the caller's counter and records the handle under
    /// `(callee, caller)`. All other edges are skipped.
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of functions and call edges
    ///
    /// # Complexity
    ///
    /// O(F + E log F) for F functions and E call edges.
    pub fn build<P>(provider: &P) -> Self
    where
        P: CallGraphProvider + ?Sized,
    {
        let pending: BTreeMap<FunctionId, usize> = provider
            .function_ids()
            .filter(|id| provider.has_body(*id))
            .map(|id| (id, 0))
            .collect();

        let mut index = Self {
            pending,
            ..Self::default()
        };

        for edge in provider.call_edges() {
            let Some(callee) = edge.callee() else {
                index.skipped_edges += 1;
                continue;
            };
            if !index.pending.contains_key(&edge.caller) || !index.pending.contains_key(&callee)
            {
                index.skipped_edges += 1;
                continue;
            }

            if let Some(count) = index.pending.get_mut(&edge.caller) {
                *count += 1;
            }
            index
                .adjacency
                .entry(callee)
                .or_default()
                .entry(edge.caller)
                .or_default()
                .push(edge.site);
            index
                .callees
                .entry(edge.caller)
                .or_default()
                .insert(callee);
            index.edge_count += 1;
        }

        index
    }

    /// Returns the number of functions with bodies.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of indexed call edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns `true` if `function` is part of the index (i.e. had a body at build time).
    #[must_use]
    pub fn contains(&self, function: FunctionId) -> bool {
        self.pending.contains_key(&function)
    }

    /// Returns the number of calls `function` makes to functions with bodies.
    ///
    /// # Returns
    ///
    /// `None` if `function` is not indexed.
    #[must_use]
    pub fn pending_out_calls(&self, function: FunctionId) -> Option<usize> {
        self.pending.get(&function).copied()
    }

    /// Returns the out-call counters of all indexed functions, in module order.
    #[must_use]
    pub fn pending_counts(&self) -> &BTreeMap<FunctionId, usize> {
        &self.pending
    }

    /// Iterates over functions that make no calls to functions with bodies.
    pub fn sinks(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
    }

    /// Iterates over the callers of `callee` together with the handles of their calls to it.
    pub fn callers_of(
        &self,
        callee: FunctionId,
    ) -> impl Iterator<Item = (FunctionId, &[CallSiteId])> + '_ {
        self.adjacency
            .get(&callee)
            .into_iter()
            .flatten()
            .map(|(caller, sites)| (*caller, sites.as_slice()))
    }

    /// Returns the recorded handles of calls from `caller` to `callee`.
    #[must_use]
    pub fn call_sites(&self, callee: FunctionId, caller: FunctionId) -> &[CallSiteId] {
        self.adjacency
            .get(&callee)
            .and_then(|callers| callers.get(&caller))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over the distinct indexed callees of `caller`, in module order.
    pub fn callees_of(&self, caller: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.callees.get(&caller).into_iter().flatten().copied()
    }

    /// Returns statistics about the index.
    #[must_use]
    pub fn stats(&self) -> CallGraphIndexStats {
        CallGraphIndexStats {
            function_count: self.function_count(),
            edge_count: self.edge_count,
            skipped_edges: self.skipped_edges,
            sink_count: self.sinks().count(),
        }
    }
}
