//! Configuration for a lowering run.

/// Default iteration cap of the fixpoint strategy.
pub const DEFAULT_FIXPOINT_ITERATIONS: usize = 32;

/// How call sites into phase functions are ordered and inlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlineStrategy {
    /// One pass over a call-graph snapshot in callee-before-caller order.
    ///
    /// Linear in the number of call edges; members of call cycles are left unresolved.
    #[default]
    BottomUp,

    /// Repeatedly scan every function and inline phase calls until nothing changes.
    ///
    /// Costs one module scan per level of call depth. Self calls and direct two-function
    /// recursion are skipped; anything else still changing after `max_iterations` scans is an
    /// [`Error::FixpointDiverged`](crate::Error::FixpointDiverged).
    Fixpoint {
        /// Maximum number of full module scans.
        max_iterations: usize,
    },
}

impl InlineStrategy {
    /// Returns the fixpoint strategy with the default iteration cap.
    #[must_use]
    pub fn fixpoint() -> Self {
        Self::Fixpoint {
            max_iterations: DEFAULT_FIXPOINT_ITERATIONS,
        }
    }

    /// Returns the name used for this strategy in trace events.
    #[must_use]
    pub fn pass_name(&self) -> &'static str {
        match self {
            Self::BottomUp => "bottom-up-inliner",
            Self::Fixpoint { .. } => "fixpoint-inliner",
        }
    }
}

/// Configuration for [`TransformDriver`](crate::compiler::TransformDriver).
///
/// # Example
///
/// ```rust
/// use phaselower::compiler::{InlineStrategy, LoweringConfig};
///
/// let config = LoweringConfig::for_phase(2)
///     .with_strategy(InlineStrategy::fixpoint())
///     .with_strict_invariants(false);
///
/// assert_eq!(config.phase, 2);
/// assert!(config.sweep_dead_functions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringConfig {
    /// The phase whose tagged functions are flattened and removed (default: 0).
    pub phase: u32,

    /// Inlining order (default: [`InlineStrategy::BottomUp`]).
    pub strategy: InlineStrategy,

    /// Treat a protected function carrying the phase tag as fatal (default: true).
    ///
    /// When disabled the violation is recorded in the trace and the function is kept.
    pub strict_invariants: bool,

    /// Remove phase functions left without users after inlining (default: true).
    pub sweep_dead_functions: bool,

    /// Break unresolved functions down into call cycles (default: true).
    pub diagnose_cycles: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            phase: 0,
            strategy: InlineStrategy::BottomUp,
            strict_invariants: true,
            sweep_dead_functions: true,
            diagnose_cycles: true,
        }
    }
}

impl LoweringConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a default configuration lowering `phase`.
    #[must_use]
    pub fn for_phase(phase: u32) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    /// Sets the phase to lower.
    ///
    /// # Arguments
    ///
    /// * `phase` - Phase number matched against each function's `lower-phase` tag.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_phase(mut self, phase: u32) -> Self {
        self.phase = phase;
        self
    }

    /// Sets the inlining strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: InlineStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables or disables fatal invariant checks.
    #[must_use]
    pub fn with_strict_invariants(mut self, strict: bool) -> Self {
        self.strict_invariants = strict;
        self
    }

    /// Enables or disables removal of dead phase functions.
    #[must_use]
    pub fn with_sweep(mut self, sweep: bool) -> Self {
        self.sweep_dead_functions = sweep;
        self
    }

    /// Enables or disables the cycle breakdown of unresolved functions.
    #[must_use]
    pub fn with_cycle_diagnostics(mut self, diagnose: bool) -> Self {
        self.diagnose_cycles = diagnose;
        self
    }
}
