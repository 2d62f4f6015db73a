//! Analyses lowering relies on.
//!
//! - [`callgraph`] - Call-graph snapshot, provider capability and cycle diagnostics
//! - [`PhaseClassifier`] - Decides which functions belong to the phase being lowered

pub mod callgraph;
mod phase;

pub use phase::{parse_phase_tag, PhaseAttributes, PhaseClassifier, LOWER_PHASE_ATTRIBUTE};
