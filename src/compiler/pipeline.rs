//! Lowering several phases in sequence.
//!
//! A compiler pipeline schedules the lowering pass once per phase, each run seeing the output of
//! the previous one. [`LoweringPipeline`] does exactly that with one shared configuration and
//! collects the per-phase outcomes. The first failing phase aborts the pipeline; phases before it
//! stay applied.

use crate::{
    compiler::{EventLog, LoweringConfig, LoweringOutcome, LoweringTarget, TransformDriver},
    Result,
};

/// Outcomes of a [`LoweringPipeline`] run, in phase order.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// One outcome per phase run.
    pub outcomes: Vec<LoweringOutcome>,
}

impl PipelineOutcome {
    /// Returns `true` if any phase changed the module.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|o| o.changed)
    }

    /// Returns the total number of call sites inlined.
    #[must_use]
    pub fn inlined(&self) -> usize {
        self.outcomes.iter().map(|o| o.inlined).sum()
    }

    /// Returns the names of all removed functions, in removal order.
    pub fn removed(&self) -> impl Iterator<Item = &str> + '_ {
        self.outcomes
            .iter()
            .flat_map(|o| o.removed.iter().map(|r| r.name.as_str()))
    }

    /// Returns the outcome of `phase`, if it ran.
    #[must_use]
    pub fn outcome(&self, phase: u32) -> Option<&LoweringOutcome> {
        self.outcomes.iter().find(|o| o.phase == phase)
    }

    /// Returns the traces of all phases merged into one log.
    #[must_use]
    pub fn events(&self) -> EventLog {
        let log = EventLog::new();
        for outcome in &self.outcomes {
            log.merge(&outcome.events);
        }
        log
    }
}

/// Runs [`TransformDriver`] for an ordered list of phases.
///
/// # Example
///
/// ```rust
/// use phaselower::{compiler::{LoweringConfig, LoweringPipeline}, ir::{Function, Module}};
///
/// let mut module = Module::new("m");
/// let early = module.add_function(Function::new("early").with_phase(1))?;
/// let late = module.add_function(Function::new("late").with_phase(2))?;
/// let main = module.add_function(Function::new("main").protected())?;
/// module.body(early)?.op("a").ret();
/// module.body(late)?.call(early).ret();
/// module.body(main)?.call(late).ret();
///
/// let outcome = LoweringPipeline::new(LoweringConfig::default())
///     .with_phases([1, 2])
///     .run(&mut module)?;
///
/// assert!(outcome.changed());
/// assert_eq!(outcome.removed().collect::<Vec<_>>(), vec!["early", "late"]);
/// assert_eq!(module.len(), 1);
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoweringPipeline {
    config: LoweringConfig,
    phases: Vec<u32>,
}

impl LoweringPipeline {
    /// Creates an empty pipeline. `config.phase` is replaced per run.
    #[must_use]
    pub fn new(config: LoweringConfig) -> Self {
        Self {
            config,
            phases: Vec::new(),
        }
    }

    /// Appends a phase.
    #[must_use]
    pub fn with_phase(mut self, phase: u32) -> Self {
        self.phases.push(phase);
        self
    }

    /// Appends several phases, in iteration order.
    #[must_use]
    pub fn with_phases(mut self, phases: impl IntoIterator<Item = u32>) -> Self {
        self.phases.extend(phases);
        self
    }

    /// Returns the phases in run order.
    #[must_use]
    pub fn phases(&self) -> &[u32] {
        &self.phases
    }

    /// Runs every phase in order.
    ///
    /// # Errors
    ///
    /// Returns the first error a phase run reports. Earlier phases are not rolled back.
    pub fn run<T>(&self, target: &mut T) -> Result<PipelineOutcome>
    where
        T: LoweringTarget + ?Sized,
    {
        let mut result = PipelineOutcome::default();

        for &phase in &self.phases {
            let driver = TransformDriver::new(self.config.clone().with_phase(phase));
            let outcome = driver.run(target)?;
            log::debug!("{outcome}");
            result.outcomes.push(outcome);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compiler::{LoweringConfig, LoweringPipeline},
        ir::{Function, Module},
        test::factories,
        Error,
    };

    #[test]
    fn test_phases_run_in_order() {
        let (mut module, ids) = factories::nested_scenario();
        let pipeline = LoweringPipeline::new(LoweringConfig::default())
            .with_phase(3)
            .with_phase(1);
        assert_eq!(pipeline.phases(), &[3, 1]);

        let outcome = pipeline.run(&mut module).unwrap();
        assert_eq!(outcome.outcomes.len(), 2);
        assert!(!outcome.outcome(3).unwrap().changed);
        assert!(outcome.outcome(1).unwrap().changed);
        assert!(outcome.outcome(2).is_none());
        assert_eq!(outcome.inlined(), 2);
        assert!(outcome.changed());
        assert!(module.contains(ids.top));
        assert_eq!(module.len(), 1);
        assert_eq!(outcome.events().len(), 2 + outcome.outcome(1).unwrap().events.len());
    }

    #[test]
    fn test_failing_phase_stops_pipeline() {
        let mut module = Module::new("m");
        let entry = module.add_function(Function::new("entry").with_phase(2).protected()).unwrap();
        let helper = module.add_function(Function::new("helper").with_phase(1)).unwrap();
        module.body(helper).unwrap().ret();
        module.body(entry).unwrap().call(helper).ret();

        let result = LoweringPipeline::new(LoweringConfig::default())
            .with_phases([1, 2, 3])
            .run(&mut module);

        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        // phase 1 stays applied
        assert!(!module.contains(helper));
        assert!(module.contains(entry));
    }
}
