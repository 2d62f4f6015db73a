//! Removal of phase functions that inlining left without users.
//!
//! A function is removed iff it carries the phase tag being lowered, is not protected, and no
//! instruction anywhere in the module calls or references it. Self calls count as uses, so a
//! recursive phase function is never removed by this pass, and neither is a member of a call
//! cycle that the inliner could not resolve.
//!
//! Removing a function drops its body and with it the uses it made of other functions. Use
//! counts are taken once per run and decremented as bodies go away; a phase function whose
//! count drops to zero is queued and removed in the same run. The sweep is linear in the
//! number of call and reference instructions.

use std::collections::{BTreeMap, VecDeque};

use crate::{
    analysis::PhaseClassifier,
    compiler::{passes::display_name, EventKind, EventLog, LoweringTarget},
    ir::FunctionId,
    Result,
};

/// A function removed by [`DeadPhaseFunctionSweeper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedFunction {
    /// The identifier the function had. It no longer resolves.
    pub id: FunctionId,
    /// The function's name.
    pub name: String,
}

/// Removes phase functions with no remaining users.
#[derive(Debug, Clone, Copy)]
pub struct DeadPhaseFunctionSweeper {
    classifier: PhaseClassifier,
}

impl DeadPhaseFunctionSweeper {
    /// Name used for this pass in trace events.
    pub const NAME: &'static str = "dead-phase-function-sweeper";

    /// Creates a sweeper for the classifier's phase.
    #[must_use]
    pub fn new(classifier: PhaseClassifier) -> Self {
        Self { classifier }
    }

    /// Returns `true` if `function` may be removed once nothing uses it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the function carries an unparsable phase tag.
    pub fn is_candidate<T>(&self, target: &T, function: FunctionId) -> Result<bool>
    where
        T: LoweringTarget + ?Sized,
    {
        Ok(self.classifier.is_phase_tagged(target, function)? && !target.is_protected(function))
    }

    /// Removes every candidate without users, cascading through the uses of removed bodies.
    ///
    /// # Arguments
    ///
    /// * `target` - The module to remove functions from
    /// * `events` - Trace receiving one event per removal
    ///
    /// # Returns
    ///
    /// The removed functions, in removal order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a function carries an unparsable phase tag.
    pub fn run<T>(&self, target: &mut T, events: &EventLog) -> Result<Vec<RemovedFunction>>
    where
        T: LoweringTarget + ?Sized,
    {
        let phase = self.classifier.phase();
        let functions: Vec<FunctionId> = target.function_ids().collect();

        let mut users: BTreeMap<FunctionId, usize> = BTreeMap::new();
        for &function in &functions {
            for used in target.uses_in(function) {
                *users.entry(used).or_default() += 1;
            }
        }

        let mut queue: VecDeque<FunctionId> = functions
            .into_iter()
            .filter(|function| !users.contains_key(function))
            .collect();
        let mut removed = Vec::new();

        while let Some(function) = queue.pop_front() {
            if !self.is_candidate(&*target, function)? {
                continue;
            }

            let released: Vec<FunctionId> = target.uses_in(function).collect();
            let name = display_name(&*target, function);
            if !target.erase_function(function) {
                continue;
            }

            log::debug!("phase {phase}: removed dead phase function {name}");
            events
                .record(EventKind::FunctionRemoved)
                .function(function)
                .phase(phase)
                .pass(Self::NAME)
                .message(format!("removed {name}"));
            removed.push(RemovedFunction { id: function, name });

            for used in released {
                let Some(count) = users.get_mut(&used) else {
                    continue;
                };
                *count = count.saturating_sub(1);
                if *count == 0 {
                    users.remove(&used);
                    queue.push_back(used);
                }
            }
        }

        Ok(removed)
    }
}
