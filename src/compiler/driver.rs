//! One full lowering run for a single phase.
//!
//! [`TransformDriver::run`] performs, in order:
//!
//! 1. **Validation** - every phase tag in the module is parsed and protected functions are
//!    checked for the phase tag. Fatal problems abort here, before anything is mutated.
//! 2. **Indexing** - a [`CallGraphIndex`] snapshot is taken.
//! 3. **Inlining** - with the configured [`InlineStrategy`].
//! 4. **Cycle diagnosis** - unresolved functions are broken down into call cycles.
//! 5. **Sweeping** - phase functions left without users are removed.
//!
//! The driver does not loop. Phase functions kept alive by a call cycle stay in the module and
//! are reported in [`LoweringOutcome::residue`]; a later run only removes them if something else
//! has broken the cycle in the meantime.

use std::fmt;

use crate::{
    analysis::{
        callgraph::{find_call_cycles, CallGraphIndex, CallGraphProvider},
        PhaseClassifier,
    },
    compiler::{
        passes::{
            display_name, BottomUpInliner, DeadPhaseFunctionSweeper, FixpointInliner,
            InlineReport, RemovedFunction,
        },
        EventKind, EventLog, InlineStrategy, LoweringConfig, LoweringStats, LoweringTarget,
    },
    ir::FunctionId,
    Error, Result,
};

/// Which analyses of the module survive a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preserved {
    /// The module is unchanged; everything computed on it is still valid.
    All,
    /// The module changed; analyses must be recomputed.
    None,
}

/// Functions a run could not resolve.
///
/// `processed` and `total` are the worklist's counters: a run over an acyclic call graph
/// processes every function with a body. Unresolved functions are either members of one of
/// `cycles` or call (transitively) into one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResidue {
    /// Functions fully resolved.
    pub processed: usize,
    /// Functions with bodies at the start of the run.
    pub total: usize,
    /// Functions left unresolved, in module order.
    pub unresolved: Vec<FunctionId>,
    /// Call cycles among the unresolved functions, each sorted.
    pub cycles: Vec<Vec<FunctionId>>,
}

impl CycleResidue {
    /// Returns `true` if every function was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Returns `true` if `function` is a member of a reported cycle.
    #[must_use]
    pub fn in_cycle(&self, function: FunctionId) -> bool {
        self.cycles.iter().any(|cycle| cycle.contains(&function))
    }
}

/// Result of one [`TransformDriver::run`].
#[derive(Debug, Clone)]
pub struct LoweringOutcome {
    /// The phase that was lowered.
    pub phase: u32,
    /// `true` if any call was inlined or any function removed.
    pub changed: bool,
    /// Call sites inlined.
    pub inlined: usize,
    /// Inline attempts the inliner refused.
    pub failed: usize,
    /// Functions removed by the sweep.
    pub removed: Vec<RemovedFunction>,
    /// What the inliner could not resolve.
    pub residue: CycleResidue,
    /// Full trace of the run.
    pub events: EventLog,
}

impl LoweringOutcome {
    /// Returns which analyses survive this run.
    #[must_use]
    pub fn preserved(&self) -> Preserved {
        if self.changed {
            Preserved::None
        } else {
            Preserved::All
        }
    }

    /// Returns counters derived from the trace.
    #[must_use]
    pub fn stats(&self) -> LoweringStats {
        LoweringStats::from_log(&self.events)
    }

    /// Returns `true` if a function with this name was removed.
    #[must_use]
    pub fn was_removed(&self, name: &str) -> bool {
        self.removed.iter().any(|r| r.name == name)
    }
}

impl fmt::Display for LoweringOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {}: {}", self.phase, self.stats())?;
        if !self.residue.is_empty() {
            write!(
                f,
                " ({} of {} functions resolved)",
                self.residue.processed, self.residue.total
            )?;
        }
        Ok(())
    }
}

/// Runs one phase of lowering on a module.
///
/// # Example
///
/// ```rust
/// use phaselower::{compiler::{LoweringConfig, TransformDriver}, ir::{Function, Module}};
///
/// let mut module = Module::new("m");
/// let leaf = module.add_function(Function::new("leaf").with_phase(1))?;
/// let top = module.add_function(Function::new("top").protected())?;
/// module.body(leaf)?.op("work").ret();
/// module.body(top)?.call(leaf).ret();
///
/// let outcome = TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module)?;
/// assert!(outcome.changed);
/// assert!(outcome.was_removed("leaf"));
/// assert_eq!(module.len(), 1);
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransformDriver {
    config: LoweringConfig,
}

impl TransformDriver {
    /// Creates a driver with the given configuration.
    #[must_use]
    pub fn new(config: LoweringConfig) -> Self {
        Self { config }
    }

    /// Returns the driver's configuration.
    #[must_use]
    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    /// Lowers the configured phase.
    ///
    /// # Arguments
    ///
    /// * `target` - The module to lower
    ///
    /// # Returns
    ///
    /// What the run did, including its trace.
    ///
    /// # Errors
    ///
    /// - [`Error::Malformed`] if any function carries an unparsable phase tag
    /// - [`Error::InvariantViolation`] if a protected function carries the phase tag and
    ///   strict invariants are enabled
    /// - [`Error::FixpointDiverged`] if the fixpoint strategy hit its iteration cap
    ///
    /// The first two are detected before the module is touched.
    pub fn run<T>(&self, target: &mut T) -> Result<LoweringOutcome>
    where
        T: LoweringTarget + ?Sized,
    {
        let phase = self.config.phase;
        let classifier = PhaseClassifier::new(phase);
        let events = EventLog::new();
        let pass = self.config.strategy.pass_name();

        self.validate(&*target, &classifier, &events)?;

        events
            .record(EventKind::PassStarted)
            .phase(phase)
            .pass(pass)
            .message(format!("lowering phase {phase}"));

        let index = CallGraphIndex::build(&*target);
        let stats = index.stats();
        log::debug!(
            "phase {}: indexed {} functions, {} call edges ({} skipped), {} sinks",
            phase,
            stats.function_count,
            stats.edge_count,
            stats.skipped_edges,
            stats.sink_count
        );

        let report = match self.config.strategy {
            InlineStrategy::BottomUp => {
                BottomUpInliner::new(classifier).run(target, &index, &events)?
            }
            InlineStrategy::Fixpoint { max_iterations } => {
                FixpointInliner::new(classifier, max_iterations).run(target, &events)?
            }
        };

        let residue = self.diagnose(&*target, &index, &report, &events);

        let removed = if self.config.sweep_dead_functions {
            DeadPhaseFunctionSweeper::new(classifier).run(target, &events)?
        } else {
            Vec::new()
        };

        let changed = report.changed() || !removed.is_empty();
        events
            .record(EventKind::PassCompleted)
            .phase(phase)
            .pass(pass)
            .message(format!(
                "phase {}: {} inlined, {} removed",
                phase,
                report.inlined,
                removed.len()
            ));
        log::debug!("phase {phase}: {}", events.summary());

        Ok(LoweringOutcome {
            phase,
            changed,
            inlined: report.inlined,
            failed: report.failed,
            removed,
            residue,
            events,
        })
    }

    /// Checks every phase tag and the protection invariant before anything is mutated.
    fn validate<T>(&self, target: &T, classifier: &PhaseClassifier, events: &EventLog) -> Result<()>
    where
        T: LoweringTarget + ?Sized,
    {
        let phase = classifier.phase();

        for function in target.function_ids() {
            let tagged = classifier.is_phase_tagged(target, function)?;
            if !tagged || !target.is_protected(function) {
                continue;
            }

            let message = format!(
                "protected function {} carries lowering phase {}",
                display_name(target, function),
                phase
            );
            if self.config.strict_invariants {
                return Err(Error::InvariantViolation(message));
            }

            log::error!("{message}");
            events
                .record(EventKind::InvariantViolation)
                .function(function)
                .phase(phase)
                .message(message);
        }

        Ok(())
    }

    /// Turns the inliner's unresolved functions into a residue report.
    fn diagnose<T>(
        &self,
        target: &T,
        index: &CallGraphIndex,
        report: &InlineReport,
        events: &EventLog,
    ) -> CycleResidue
    where
        T: CallGraphProvider + ?Sized,
    {
        let phase = self.config.phase;
        let mut residue = CycleResidue {
            processed: report.processed,
            total: report.total,
            unresolved: report.unresolved.clone(),
            cycles: Vec::new(),
        };
        if residue.is_empty() {
            return residue;
        }

        log::warn!(
            "phase {}: {} of {} functions left unresolved by call cycles",
            phase,
            residue.unresolved.len(),
            residue.total
        );

        if !self.config.diagnose_cycles {
            events
                .record(EventKind::CycleDetected)
                .phase(phase)
                .message(format!(
                    "{} functions left unresolved",
                    residue.unresolved.len()
                ));
            return residue;
        }

        residue.cycles = find_call_cycles(index, &residue.unresolved);
        for cycle in &residue.cycles {
            let names: Vec<String> = cycle.iter().map(|f| display_name(target, *f)).collect();
            let message = format!("call cycle left unresolved: {}", names.join(", "));
            log::warn!("phase {phase}: {message}");

            let mut event = events.record(EventKind::CycleDetected).phase(phase);
            if let Some(first) = cycle.first() {
                event = event.function(*first);
            }
            event.message(message);
        }

        residue
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compiler::{EventKind, InlineStrategy, LoweringConfig, Preserved, TransformDriver},
        ir::{Function, Module},
        test::factories,
        Error,
    };

    #[test]
    fn test_nested_scenario() {
        let (mut module, ids) = factories::nested_scenario();
        let outcome = TransformDriver::new(LoweringConfig::for_phase(1))
            .run(&mut module)
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.preserved(), Preserved::None);
        assert_eq!(outcome.inlined, 2);
        assert!(outcome.was_removed("leaf"));
        assert!(outcome.was_removed("mid"));
        assert!(outcome.residue.is_empty());
        assert_eq!(module.len(), 1);
        assert!(module.contains(ids.top));

        let kinds: Vec<_> = outcome.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds.first(), Some(&EventKind::PassStarted));
        assert_eq!(kinds.last(), Some(&EventKind::PassCompleted));
        assert_eq!(outcome.to_string(), "phase 1: 2 inlined, 2 removed");
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let (mut module, _) = factories::nested_scenario();
        let driver = TransformDriver::new(LoweringConfig::for_phase(1));
        driver.run(&mut module).unwrap();
        let snapshot = module.to_string();

        let outcome = driver.run(&mut module).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.preserved(), Preserved::All);
        assert_eq!(module.to_string(), snapshot);
    }

    #[test]
    fn test_cycle_residue_is_reported() {
        let (mut module, a, b) = factories::mutual_cycle(2);
        let outcome = TransformDriver::new(LoweringConfig::for_phase(2))
            .run(&mut module)
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.residue.processed, 0);
        assert_eq!(outcome.residue.total, 2);
        assert_eq!(outcome.residue.cycles, vec![vec![a, b]]);
        assert!(outcome.residue.in_cycle(a));
        assert_eq!(outcome.events.count_kind(EventKind::CycleDetected), 1);
        assert!(module.contains(a) && module.contains(b));
        assert_eq!(
            outcome.to_string(),
            "phase 2: 1 cycles (0 of 2 functions resolved)"
        );
    }

    #[test]
    fn test_cycle_summary_without_diagnosis() {
        let (mut module, _, _) = factories::mutual_cycle(2);
        let config = LoweringConfig::for_phase(2).with_cycle_diagnostics(false);
        let outcome = TransformDriver::new(config).run(&mut module).unwrap();

        assert!(outcome.residue.cycles.is_empty());
        assert_eq!(outcome.residue.unresolved.len(), 2);
        let event = outcome
            .events
            .filter_kind(EventKind::CycleDetected)
            .next()
            .unwrap();
        assert_eq!(event.message, "2 functions left unresolved");
    }

    #[test]
    fn test_malformed_tag_aborts_before_mutation() {
        let (mut module, _) = factories::nested_scenario();
        module.add_function(Function::new("broken").with_attribute("lower-phase", "one")).unwrap();
        let snapshot = module.to_string();

        let result = TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module);
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert_eq!(module.to_string(), snapshot);
    }

    #[test]
    fn test_protected_phase_function() {
        let mut module = Module::new("m");
        let entry = module.add_function(Function::new("entry").with_phase(1).protected()).unwrap();
        let helper = module.add_function(Function::new("helper").with_phase(1)).unwrap();
        module.body(helper).unwrap().op("work").ret();
        module.body(entry).unwrap().call(helper).ret();

        let strict = TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module);
        assert!(matches!(strict, Err(Error::InvariantViolation(_))));
        assert_eq!(module.len(), 2);

        let relaxed = LoweringConfig::for_phase(1).with_strict_invariants(false);
        let outcome = TransformDriver::new(relaxed).run(&mut module).unwrap();
        assert_eq!(outcome.events.count_kind(EventKind::InvariantViolation), 1);
        assert!(outcome.was_removed("helper"));
        assert!(module.contains(entry));
    }

    #[test]
    fn test_sweep_can_be_disabled() {
        let (mut module, ids) = factories::nested_scenario();
        let config = LoweringConfig::for_phase(1).with_sweep(false);
        let outcome = TransformDriver::new(config).run(&mut module).unwrap();

        assert!(outcome.changed);
        assert!(outcome.removed.is_empty());
        assert!(module.contains(ids.leaf));
        assert!(module.contains(ids.mid));
    }

    #[test]
    fn test_fixpoint_strategy_matches_bottom_up() {
        let (mut bottom_up, _) = factories::nested_scenario();
        let (mut fixpoint, _) = factories::nested_scenario();

        TransformDriver::new(LoweringConfig::for_phase(1))
            .run(&mut bottom_up)
            .unwrap();
        let outcome = TransformDriver::new(
            LoweringConfig::for_phase(1).with_strategy(InlineStrategy::fixpoint()),
        )
        .run(&mut fixpoint)
        .unwrap();

        assert!(outcome.changed);
        assert_eq!(bottom_up.to_string(), fixpoint.to_string());
    }
}
