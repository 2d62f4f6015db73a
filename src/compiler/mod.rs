//! Phase lowering: inlining phase functions into their callers and removing them.
//!
//! This module sits on top of [`crate::analysis`] and drives the mutation capabilities a module
//! exposes through [`LoweringTarget`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Lowering Pipeline                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  LoweringPipeline          One driver run per phase, in order│
//! │                                                              │
//! │  TransformDriver           One phase                         │
//! │    ├─ validate             Phase tags, protection invariant  │
//! │    ├─ CallGraphIndex       Snapshot of out-calls and callers │
//! │    ├─ inline               BottomUpInliner | FixpointInliner │
//! │    ├─ diagnose             Unresolved functions → cycles     │
//! │    └─ sweep                DeadPhaseFunctionSweeper          │
//! │                                                              │
//! │  Worklist                  Callee-before-caller order        │
//! │  EventLog                  Trace of every attempt/removal    │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod driver;
mod events;
mod passes;
mod pipeline;
mod target;
mod worklist;

pub use config::{InlineStrategy, LoweringConfig, DEFAULT_FIXPOINT_ITERATIONS};
pub use driver::{CycleResidue, LoweringOutcome, Preserved, TransformDriver};
pub use events::{Event, EventBuilder, EventKind, EventLog, EventLogIter, LoweringStats};
pub use passes::{
    BottomUpInliner, DeadPhaseFunctionSweeper, FixpointInliner, InlineReport, RemovedFunction,
};
pub use pipeline::{LoweringPipeline, PipelineOutcome};
pub use target::{FunctionSweep, InlineResult, Inliner, LoweringTarget};
pub use worklist::Worklist;
