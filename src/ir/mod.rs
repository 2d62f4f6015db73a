//! Reference in-memory module representation.
//!
//! Lowering is written against capability traits, not against a concrete IR. This module is the
//! concrete IR the crate ships with: small enough to build modules by hand in tests, but
//! faithful about the things lowering depends on.
//!
//! # Key Components
//!
//! - [`Module`] - Arena of functions with stable [`FunctionId`]s and live call-site tracking
//! - [`Function`] - A definition or declaration with attributes and [`FunctionFlags`]
//! - [`Instruction`] - Opaque ops, calls, address-of references and returns
//! - [`CallSiteId`] - Handle of one call instruction; goes stale when consumed
//! - [`BodyBuilder`] - Fluent construction of function bodies
//!
//! # Example
//!
//! ```rust
//! use phaselower::ir::{Function, Module};
//!
//! let mut module = Module::new("example");
//! let puts = module.add_function(Function::new("puts"))?;
//! let helper = module.add_function(Function::new("helper").with_phase(1))?;
//! let main = module.add_function(Function::new("main").protected())?;
//!
//! module.body(helper)?.op("load msg").call(puts).ret();
//! module.body(main)?.call(helper).ret();
//!
//! assert!(module.function(puts).unwrap().is_declaration());
//! assert_eq!(module.len(), 3);
//! # Ok::<(), phaselower::Error>(())
//! ```

mod function;
mod inline;
mod instruction;
mod module;
mod token;

pub use function::{Function, FunctionFlags};
pub use instruction::{CallTarget, Instruction};
pub use module::{BodyBuilder, Module};
pub use token::{CallSiteId, FunctionId};
