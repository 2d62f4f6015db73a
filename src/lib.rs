// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # phaselower
//!
//! Phase-scoped bottom-up inlining for compiler pipelines.
//!
//! Lowering pipelines often emit *scaffolding functions*: small helpers that only exist to be
//! flattened away at a particular stage. Each one carries a `lower-phase` tag naming that stage.
//! `phaselower` takes a module and a phase number, inlines every call to a function tagged with
//! that phase, and deletes the tagged functions that end up without users.
//!
//! ## Features
//!
//! - **Bottom-up order** - callees are fully flattened before they are spliced into callers, in a
//!   single pass that is linear in the number of call edges
//! - **Cycle tolerant** - call cycles terminate the pass cleanly and are reported, never expanded
//! - **Stale-handle safe** - call-site handles are revalidated against the live module before use
//! - **IR agnostic** - the engine only talks to capability traits; [`ir::Module`] is a ready-made
//!   reference implementation
//! - **Traceable** - every inline attempt and removal is recorded in an [`compiler::EventLog`]
//!
//! ## Quick Start
//!
//! ```rust
//! use phaselower::prelude::*;
//!
//! let mut module = Module::new("example");
//! let leaf = module.add_function(Function::new("leaf").with_phase(1))?;
//! let mid = module.add_function(Function::new("mid").with_phase(1))?;
//! let top = module.add_function(Function::new("top").protected())?;
//!
//! module.body(leaf)?.op("leaf.work").ret();
//! module.body(mid)?.call(leaf).ret();
//! module.body(top)?.call(mid).ret();
//!
//! let outcome = TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module)?;
//!
//! assert!(outcome.changed);
//! assert_eq!(outcome.inlined, 2);
//! assert_eq!(module.len(), 1);
//! # Ok::<(), phaselower::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`ir`] - Reference module model: functions, instructions, call-site handles, body splicing
//! - [`analysis`] - Phase classification and the call-graph snapshot with cycle diagnostics
//! - [`compiler`] - Worklist, passes, driver, pipeline and the event trace
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Bringing Your Own IR
//!
//! The driver accepts any [`compiler::LoweringTarget`], which is implemented automatically for
//! types providing:
//!
//! - [`analysis::callgraph::CallGraphProvider`] - functions, call edges, call-site revalidation
//! - [`analysis::PhaseAttributes`] - raw phase tags and the protection flag
//! - [`compiler::Inliner`] - splicing a callee into a call site
//! - [`compiler::FunctionSweep`] - use counting and deletion
//!
//! ## Error Handling
//!
//! Only conditions that make the module untrustworthy abort a run: a phase tag that does not
//! parse, or a protected function tagged for the phase being lowered. Both are detected before
//! anything is mutated. Refused inlines and call cycles are recorded in the trace and logged
//! through the [`log`](https://docs.rs/log) facade; the run carries on.
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! # Install fuzzing tools
//! cargo install cargo-fuzz
//!
//! # Run fuzzer
//! cargo +nightly fuzz run lowering
//! ```
//!
//! ### Benchmarks
//!
//! ```bash
//! cargo bench --bench lowering
//! ```

#[macro_use]
pub(crate) mod error;


/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use phaselower::prelude::*;
///
/// let mut module = Module::new("empty");
/// let outcome = TransformDriver::new(LoweringConfig::for_phase(0)).run(&mut module)?;
/// assert!(!outcome.changed);
/// # Ok::<(), phaselower::Error>(())
/// ```
pub mod prelude;

/// Phase classification and call-graph analysis.
///
/// # Key Components
///
/// - [`analysis::PhaseClassifier`] - Decides whether a function belongs to a phase
/// - [`analysis::callgraph::CallGraphIndex`] - Out-call counters and callee-to-caller adjacency
/// - [`analysis::callgraph::find_call_cycles`] - Strongly connected components among unresolved
///   functions
pub mod analysis;

/// The lowering engine.
///
/// # Key Components
///
/// - [`compiler::TransformDriver`] - Runs one phase: validate, index, inline, diagnose, sweep
/// - [`compiler::LoweringPipeline`] - Runs several phases in order
/// - [`compiler::BottomUpInliner`] - Worklist inlining in callee-before-caller order
/// - [`compiler::FixpointInliner`] - Capped rescan-until-stable fallback
/// - [`compiler::DeadPhaseFunctionSweeper`] - Removes phase functions without users
/// - [`compiler::EventLog`] - Trace of the run
pub mod compiler;

/// Reference in-memory module representation.
pub mod ir;

/// `phaselower` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use phaselower::{compiler::{LoweringConfig, TransformDriver}, ir::Module, Result};
///
/// fn lower(module: &mut Module, phase: u32) -> Result<bool> {
///     Ok(TransformDriver::new(LoweringConfig::for_phase(phase)).run(module)?.changed)
/// }
///
/// assert!(!lower(&mut Module::new("m"), 1)?);
/// # Ok::<(), phaselower::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `phaselower` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use phaselower::{Error, compiler::{LoweringConfig, TransformDriver}, ir::{Function, Module}};
///
/// let mut module = Module::new("m");
/// module.add_function(Function::new("entry").with_phase(1).protected())?;
///
/// match TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module) {
///     Ok(outcome) => println!("changed: {}", outcome.changed),
///     Err(Error::InvariantViolation(message)) => println!("upstream bug: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// # Ok::<(), phaselower::Error>(())
/// ```
pub use error::Error;
