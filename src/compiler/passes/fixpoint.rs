//! Rescan-until-stable inlining of phase functions.
//!
//! Every scan walks all call edges of the module and inlines each direct call to a phase function
//! that has a body. Nested phase calls surface in the caller after inlining and are picked up by
//! the next scan, so the pass needs as many scans as the phase call graph is deep.
//!
//! Left alone, this order never terminates on recursion: each scan would copy a call to the
//! other function of a cycle back into the caller. Two guards bound the work:
//!
//! - a call to a callee that directly calls itself is never inlined, and
//! - a call to a callee that directly calls the caller back is never inlined.
//!
//! Longer cycles are not recognised and keep the module changing; once `max_iterations` scans
//! have all changed something the pass gives up with [`Error::FixpointDiverged`].
//!
//! Each scan snapshots the direct callees of every function once and keeps the snapshot current
//! as bodies are spliced, so a guard check is a map lookup rather than a walk over the module.
//! Once the module is stable the residue is measured the same way the bottom-up pass measures
//! it: a callee-first drain over the final call graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{
        callgraph::{CallEdge, CallGraphIndex},
        PhaseClassifier,
    },
    compiler::{
        passes::{display_name, InlineReport},
        EventKind, EventLog, InlineResult, LoweringTarget, Worklist,
    },
    ir::{CallSiteId, FunctionId},
    Error, Result,
};

/// Inlines calls to phase functions by rescanning the module until nothing changes.
#[derive(Debug, Clone, Copy)]
pub struct FixpointInliner {
    classifier: PhaseClassifier,
    max_iterations: usize,
}

impl FixpointInliner {
    /// Name used for this pass in trace events.
    pub const NAME: &'static str = "fixpoint-inliner";

    /// Creates an inliner for the classifier's phase that scans at most `max_iterations` times.
    #[must_use]
    pub fn new(classifier: PhaseClassifier, max_iterations: usize) -> Self {
        Self {
            classifier,
            max_iterations,
        }
    }

    /// Runs the pass.
    ///
    /// # Arguments
    ///
    /// * `target` - The module to mutate
    /// * `events` - Trace receiving inline attempts and recursion skips
    ///
    /// # Returns
    ///
    /// Counters of the run. [`InlineReport::unresolved`] lists the functions that are on a call
    /// cycle of the final module or call (transitively) into one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FixpointDiverged`] if the last allowed scan still inlined something, and
    /// [`Error::Malformed`] if a callee carries an unparsable phase tag. A diverged run leaves the
    /// module well-formed but only partly flattened.
    pub fn run<T>(&self, target: &mut T, events: &EventLog) -> Result<InlineReport>
    where
        T: LoweringTarget + ?Sized,
    {
        let phase = self.classifier.phase();
        let mut report = InlineReport::default();
        let mut refused: BTreeSet<CallSiteId> = BTreeSet::new();

        for iteration in 1..=self.max_iterations {
            let mut changed = false;
            let edges: Vec<CallEdge> = target.call_edges().collect();
            let mut calls = DirectCalls::from_edges(&edges);

            for edge in edges {
                let Some(callee) = edge.callee() else {
                    continue;
                };
                if refused.contains(&edge.site)
                    || !target.has_body(callee)
                    || !self.classifier.is_phase_tagged(&*target, callee)?
                {
                    continue;
                }
                // Consumed earlier in this scan
                if target.current_callee(edge.site) != Some(callee) {
                    continue;
                }

                if calls.contains(callee, callee) || calls.contains(callee, edge.caller) {
                    log::debug!(
                        "phase {}: not inlining recursive call from {} to {}",
                        phase,
                        display_name(&*target, edge.caller),
                        display_name(&*target, callee)
                    );
                    refused.insert(edge.site);
                    continue;
                }

                match target.inline(edge.site) {
                    InlineResult::Success => {
                        calls.splice(edge.caller, callee);
                        log::debug!(
                            "phase {}: scan {}: inlined {} into {}",
                            phase,
                            iteration,
                            display_name(&*target, callee),
                            display_name(&*target, edge.caller)
                        );
                        events
                            .record(EventKind::FunctionInlined)
                            .caller(edge.caller)
                            .function(callee)
                            .phase(phase)
                            .pass(Self::NAME);
                        report.inlined += 1;
                        changed = true;
                    }
                    InlineResult::Failure(reason) => {
                        let message = format!(
                            "failed to inline {} into {}: {}",
                            display_name(&*target, callee),
                            display_name(&*target, edge.caller),
                            reason
                        );
                        log::warn!("phase {phase}: {message}");
                        events
                            .record(EventKind::InlineFailed)
                            .caller(edge.caller)
                            .function(callee)
                            .phase(phase)
                            .pass(Self::NAME)
                            .message(message);
                        refused.insert(edge.site);
                        report.failed += 1;
                    }
                }
            }

            if !changed {
                let residue = drain(&CallGraphIndex::build(&*target));
                report.processed = residue.processed();
                report.total = residue.total();
                report.unresolved = residue.unresolved();
                return Ok(report);
            }
        }

        log::warn!(
            "phase {}: still inlining after {} scans, giving up",
            phase,
            self.max_iterations
        );
        Err(Error::FixpointDiverged {
            phase,
            iterations: self.max_iterations,
        })
    }
}

/// Direct call counts per caller, kept in step with the module during one scan.
#[derive(Debug, Default)]
struct DirectCalls {
    /// Caller -> callee -> number of direct calls.
    counts: BTreeMap<FunctionId, BTreeMap<FunctionId, usize>>,
}

impl DirectCalls {
    fn from_edges(edges: &[CallEdge]) -> Self {
        let mut calls = Self::default();
        for edge in edges {
            if let Some(callee) = edge.callee() {
                *calls
                    .counts
                    .entry(edge.caller)
                    .or_default()
                    .entry(callee)
                    .or_default() += 1;
            }
        }
        calls
    }

    fn contains(&self, from: FunctionId, to: FunctionId) -> bool {
        self.counts
            .get(&from)
            .is_some_and(|callees| callees.contains_key(&to))
    }

    /// Records that one call from `caller` to `callee` was replaced by `callee`'s body.
    fn splice(&mut self, caller: FunctionId, callee: FunctionId) {
        let inherited: Vec<(FunctionId, usize)> = self
            .counts
            .get(&callee)
            .map(|callees| callees.iter().map(|(f, n)| (*f, *n)).collect())
            .unwrap_or_default();

        let callees = self.counts.entry(caller).or_default();
        if let Some(count) = callees.get_mut(&callee) {
            *count -= 1;
            if *count == 0 {
                callees.remove(&callee);
            }
        }
        for (function, count) in inherited {
            *callees.entry(function).or_default() += count;
        }
    }
}

/// Drains a callee-first worklist over `index` without touching the module.
fn drain(index: &CallGraphIndex) -> Worklist {
    let mut worklist = Worklist::seed(index);
    while let Some(callee) = worklist.next() {
        for (caller, sites) in index.callers_of(callee) {
            for _ in sites {
                worklist.resolve_call(caller);
            }
        }
    }
    worklist
}
