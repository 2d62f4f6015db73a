//! Function definitions and declarations.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::{
    analysis::LOWER_PHASE_ATTRIBUTE,
    ir::{FunctionId, Instruction},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Properties of a function that lowering must respect
    pub struct FunctionFlags: u32 {
        /// Function must never be removed (entry points, exported symbols)
        const PROTECTED = 0x0001;
        /// Function body must not be spliced into callers
        const NO_INLINE = 0x0002;
    }
}

/// A function owned by a [`Module`](crate::ir::Module).
///
/// A function either has a body (a definition) or does not (a declaration of something defined
/// elsewhere). Attributes are free-form key/value text; the one lowering reads is
/// [`LOWER_PHASE_ATTRIBUTE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub(crate) id: FunctionId,
    name: String,
    pub(crate) body: Option<Vec<Instruction>>,
    attributes: BTreeMap<String, String>,
    flags: FunctionFlags,
}

impl Function {
    /// Creates a declaration with the given name.
    ///
    /// The function gets a body the first time instructions are appended to it through
    /// [`Module::body`](crate::ir::Module::body), or via [`Function::defined`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: FunctionId::new(0),
            name: name.into(),
            body: None,
            attributes: BTreeMap::new(),
            flags: FunctionFlags::empty(),
        }
    }

    /// Gives the function an empty body, turning a declaration into a definition.
    #[must_use]
    pub fn defined(mut self) -> Self {
        self.body.get_or_insert_with(Vec::new);
        self
    }

    /// Tags the function for lowering phase `phase`.
    #[must_use]
    pub fn with_phase(self, phase: u32) -> Self {
        self.with_attribute(LOWER_PHASE_ATTRIBUTE, phase.to_string())
    }

    /// Sets an arbitrary attribute. Used directly mostly to produce malformed phase tags.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds `flags` to the function.
    #[must_use]
    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Marks the function as protected from removal.
    #[must_use]
    pub fn protected(self) -> Self {
        self.with_flags(FunctionFlags::PROTECTED)
    }

    /// Returns the identifier assigned by the owning module.
    #[must_use]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Returns the function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the function has a body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Returns `true` if the function is only a declaration.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    /// Returns the instructions of the body, or `None` for a declaration.
    #[must_use]
    pub fn body(&self) -> Option<&[Instruction]> {
        self.body.as_deref()
    }

    /// Returns the number of instructions in the body (0 for declarations).
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }

    /// Looks up an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the function's flags.
    #[must_use]
    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    /// Returns `true` if the function must never be removed.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.flags.contains(FunctionFlags::PROTECTED)
    }

    /// Returns `true` if the function's body may be spliced into callers.
    #[must_use]
    pub fn is_inlinable(&self) -> bool {
        self.has_body() && !self.flags.contains(FunctionFlags::NO_INLINE)
    }

    /// Iterates over the direct callees of this function, one entry per call instruction.
    pub fn direct_callees(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.body
            .iter()
            .flatten()
            .filter_map(|instr| match instr {
                Instruction::Call { target, .. } => target.function(),
                _ => None,
            })
    }
}
