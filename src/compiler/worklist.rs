//! Callee-before-caller worklist over out-call counters.
//!
//! This is Kahn's algorithm run on the reversed call graph: a function is ready once every call
//! it makes to another function with a body has been resolved. Functions on a call cycle, and
//! functions that call into one, never become ready; they are what is left in
//! [`Worklist::unresolved`] when the queue drains.
//!
//! The termination argument is explicit: every function is dequeued at most once (a counter can
//! only hit zero once), so a run performs at most `total` dequeues. `processed() == total()`
//! after draining means the graph was acyclic.

use std::collections::{BTreeMap, VecDeque};

use crate::{analysis::callgraph::CallGraphIndex, ir::FunctionId};

/// FIFO queue of resolved functions plus the remaining out-call counters.
///
/// # Example
///
/// ```rust
/// use phaselower::{analysis::callgraph::CallGraphIndex, compiler::Worklist, ir::{Function, Module}};
///
/// let mut module = Module::new("m");
/// let leaf = module.add_function(Function::new("leaf"))?;
/// let top = module.add_function(Function::new("top"))?;
/// module.body(leaf)?.ret();
/// module.body(top)?.call(leaf).ret();
///
/// let mut worklist = Worklist::seed(&CallGraphIndex::build(&module));
/// assert_eq!(worklist.next(), Some(leaf));
/// assert!(worklist.resolve_call(top));
/// assert_eq!(worklist.next(), Some(top));
/// assert!(worklist.is_complete());
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    queue: VecDeque<FunctionId>,
    pending: BTreeMap<FunctionId, usize>,
    processed: usize,
}

impl Worklist {
    /// Creates a worklist from an index, enqueuing every sink in module order.
    #[must_use]
    pub fn seed(index: &CallGraphIndex) -> Self {
        Self {
            queue: index.sinks().collect(),
            pending: index.pending_counts().clone(),
            processed: 0,
        }
    }

    /// Dequeues the next resolved function and counts it as processed.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<FunctionId> {
        let function = self.queue.pop_front()?;
        self.processed += 1;
        Some(function)
    }

    /// Marks one outgoing call of `caller` as resolved.
    ///
    /// # Arguments
    ///
    /// * `caller` - The function making the call
    ///
    /// # Returns
    ///
    /// `true` if this was the caller's last pending call; the caller has been enqueued.
    /// Unknown functions and counters already at zero are left alone and return `false`.
    pub fn resolve_call(&mut self, caller: FunctionId) -> bool {
        let Some(count) = self.pending.get_mut(&caller) else {
            return false;
        };
        if *count == 0 {
            return false;
        }

        *count -= 1;
        if *count == 0 {
            self.queue.push_back(caller);
            return true;
        }
        false
    }

    /// Returns the remaining out-call count of `function`.
    #[must_use]
    pub fn pending_out_calls(&self, function: FunctionId) -> Option<usize> {
        self.pending.get(&function).copied()
    }

    /// Returns the number of functions dequeued so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Returns the number of functions the worklist was seeded over.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no function is waiting to be dequeued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns `true` once every function has been processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.processed == self.total()
    }

    /// Returns the functions whose counters never reached zero, in module order.
    #[must_use]
    pub fn unresolved(&self) -> Vec<FunctionId> {
        self.pending
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| *id)
            .collect()
    }
}
