//! Call-graph snapshot and diagnostics for phase lowering.
//!
//! This module turns the raw call edges reported by a [`CallGraphProvider`] into the two
//! structures bottom-up inlining runs on, and explains what is left over when it cannot finish.
//!
//! # Architecture
//!
//! The provider is an external capability: anything that can enumerate functions and call
//! instructions can be lowered. From it, [`CallGraphIndex::build`] takes a one-time snapshot
//! restricted to functions with bodies. The snapshot is deliberately never kept in sync with
//! the module; consumers revalidate each recorded handle through
//! [`CallGraphProvider::current_callee`] before acting on it.
//!
//! # Components
//!
//! - [`CallGraphProvider`]: Capability trait for enumerating functions and call edges
//! - [`CallEdge`]: A single call instruction observed in a caller's body
//! - [`CallGraphIndex`]: Out-call counters and callee-to-caller adjacency
//! - [`find_call_cycles`]: Strongly connected components among unresolved functions
//!
//! # Example
//!
//! ```rust
//! use phaselower::{
//!     analysis::callgraph::{find_call_cycles, CallGraphIndex},
//!     ir::{Function, Module},
//! };
//!
//! let mut module = Module::new("m");
//! let a = module.add_function(Function::new("a").with_phase(2))?;
//! let b = module.add_function(Function::new("b").with_phase(2))?;
//! module.body(a)?.call(b).ret();
//! module.body(b)?.call(a).ret();
//!
//! let index = CallGraphIndex::build(&module);
//! assert_eq!(index.sinks().count(), 0);
//! assert_eq!(find_call_cycles(&index, &[a, b]), vec![vec![a, b]]);
//! # Ok::<(), phaselower::Error>(())
//! ```

mod cycles;
mod index;
mod provider;

pub use cycles::find_call_cycles;
pub use index::{CallGraphIndex, CallGraphIndexStats};
pub use provider::{CallEdge, CallGraphProvider};
