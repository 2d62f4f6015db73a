//! # phaselower Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the phaselower library. Import this module to get quick access to everything needed
//! to build a module and lower a phase.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all phaselower operations
pub use crate::Error;

/// The result type used throughout phaselower
pub use crate::Result;

// ================================================================================================
// Module Model
// ================================================================================================

/// Reference module, functions and instructions
pub use crate::ir::{
    BodyBuilder, CallSiteId, CallTarget, Function, FunctionFlags, FunctionId, Instruction, Module,
};

// ================================================================================================
// Capabilities
// ================================================================================================

/// Traits a module implements to be lowered
pub use crate::{
    analysis::{callgraph::CallGraphProvider, PhaseAttributes},
    compiler::{FunctionSweep, InlineResult, Inliner, LoweringTarget},
};

// ================================================================================================
// Lowering
// ================================================================================================

/// Configuration, drivers and results
pub use crate::compiler::{
    CycleResidue, InlineStrategy, LoweringConfig, LoweringOutcome, LoweringPipeline, Preserved,
    TransformDriver,
};

/// Run trace
pub use crate::compiler::{EventKind, EventLog, LoweringStats};
