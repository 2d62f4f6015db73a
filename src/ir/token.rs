//! Stable identifiers for functions and call sites.
//!
//! Both identifiers are arena indices handed out by [`Module`](crate::ir::Module). They never
//! dangle: once the slot they name is erased, lookups return `None` instead of touching freed
//! storage. This is what lets the lowering pass hold on to call-site handles across mutations
//! and revalidate them before use.

use std::fmt;

/// A strongly-typed identifier for a function within a [`Module`](crate::ir::Module).
///
/// `FunctionId` wraps the function's slot index. Slots are assigned sequentially as functions
/// are added and are never reused, so ordering by `FunctionId` is module order.
///
/// # Examples
///
/// ```rust
/// use phaselower::ir::{Function, Module};
///
/// let mut module = Module::new("demo");
/// let a = module.add_function(Function::new("a"))?;
/// let b = module.add_function(Function::new("b"))?;
/// assert!(a < b);
/// assert_eq!(b.index(), 1);
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
    /// Creates a new `FunctionId` from a raw slot index.
    ///
    /// Intended for tests and deserialisation; normal code obtains identifiers from
    /// [`Module::add_function`](crate::ir::Module::add_function).
    ///
    /// # Arguments
    ///
    /// * `index` - The raw slot index (0-based)
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        FunctionId(index)
    }

    /// Returns the raw slot index of this function.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({})", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// An opaque handle naming one call instruction inside some function body.
///
/// A handle is valid from the moment the call instruction is created until the instruction is
/// consumed by inlining or its enclosing function is erased. Afterwards
/// [`Module::call_site`](crate::ir::Module::call_site) no longer resolves it. Inlining never
/// revives a handle: instructions cloned out of a callee receive fresh identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteId(pub(crate) u32);

impl CallSiteId {
    /// Creates a new `CallSiteId` from a raw value.
    #[must_use]
    #[inline]
    pub const fn new(raw: u32) -> Self {
        CallSiteId(raw)
    }

    /// Returns the raw value of this handle.
    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallSiteId({})", self.0)
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}
