//! Bottom-up inlining of phase functions.
//!
//! The pass walks the call graph callee-first using a [`Worklist`]: a function is handed to its
//! callers only after every call it makes itself has had its turn. By the time a phase function
//! is spliced into a caller, its own phase calls have already been flattened, so one linear pass
//! over the call edges is enough.
//!
//! # Call-site Revalidation
//!
//! The [`CallGraphIndex`] is a snapshot. Inlining keeps changing the module underneath it, so
//! before a recorded call site is used its current callee is looked up again through
//! [`CallGraphProvider::current_callee`]. A handle that no longer resolves to the callee it was
//! recorded for is skipped and reported as stale; it is never handed to the inliner.
//!
//! # Cycles
//!
//! Functions on a call cycle never reach a zero out-call count and are never dequeued. Calls
//! into them are left in place. The functions are returned in [`InlineReport::unresolved`].

use crate::{
    analysis::{callgraph::CallGraphIndex, PhaseClassifier},
    compiler::{
        passes::{display_name, InlineReport},
        EventKind, EventLog, InlineResult, LoweringTarget, Worklist,
    },
    Result,
};

/// Inlines every call to a phase function in callee-before-caller order.
#[derive(Debug, Clone, Copy)]
pub struct BottomUpInliner {
    classifier: PhaseClassifier,
}

impl BottomUpInliner {
    /// Name used for this pass in trace events.
    pub const NAME: &'static str = "bottom-up-inliner";

    /// Creates an inliner for the classifier's phase.
    #[must_use]
    pub fn new(classifier: PhaseClassifier) -> Self {
        Self { classifier }
    }

    /// Runs the pass.
    ///
    /// # Arguments
    ///
    /// * `target` - The module to mutate
    /// * `index` - Call-graph snapshot of `target` taken before this call
    /// * `events` - Trace receiving one event per inline attempt
    ///
    /// # Returns
    ///
    /// Counters of the run and the functions left unresolved by call cycles.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a callee carries an unparsable phase tag.
    /// Inliner refusals are not errors; they are recorded and the pass continues.
    pub fn run<T>(
        &self,
        target: &mut T,
        index: &CallGraphIndex,
        events: &EventLog,
    ) -> Result<InlineReport>
    where
        T: LoweringTarget + ?Sized,
    {
        let phase = self.classifier.phase();
        let mut worklist = Worklist::seed(index);
        let mut report = InlineReport::default();

        while let Some(callee) = worklist.next() {
            let tagged = self.classifier.is_phase_tagged(&*target, callee)?;

            for (caller, sites) in index.callers_of(callee) {
                for &site in sites {
                    worklist.resolve_call(caller);
                    if !tagged {
                        continue;
                    }

                    if target.current_callee(site) != Some(callee) {
                        log::debug!(
                            "phase {}: call site {} in {} no longer targets {}",
                            phase,
                            site,
                            display_name(&*target, caller),
                            display_name(&*target, callee)
                        );
                        events
                            .record(EventKind::StaleCallSite)
                            .caller(caller)
                            .function(callee)
                            .phase(phase)
                            .pass(Self::NAME)
                            .message(format!("skipped stale call site {site}"));
                        report.stale += 1;
                        continue;
                    }

                    match target.inline(site) {
                        InlineResult::Success => {
                            let message = format!(
                                "inlined {} into {}",
                                display_name(&*target, callee),
                                display_name(&*target, caller)
                            );
                            log::debug!("phase {phase}: {message}");
                            events
                                .record(EventKind::FunctionInlined)
                                .caller(caller)
                                .function(callee)
                                .phase(phase)
                                .pass(Self::NAME)
                                .message(message);
                            report.inlined += 1;
                        }
                        InlineResult::Failure(reason) => {
                            let message = format!(
                                "failed to inline {} into {}: {}",
                                display_name(&*target, callee),
                                display_name(&*target, caller),
                                reason
                            );
                            log::warn!("phase {phase}: {message}");
                            events
                                .record(EventKind::InlineFailed)
                                .caller(caller)
                                .function(callee)
                                .phase(phase)
                                .pass(Self::NAME)
                                .message(message);
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        report.processed = worklist.processed();
        report.total = worklist.total();
        report.unresolved = worklist.unresolved();
        Ok(report)
    }
}
