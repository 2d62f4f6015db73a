//! The reference module: an arena of functions with stable identifiers.

use std::{collections::HashMap, fmt};

use crate::{
    analysis::{
        callgraph::{CallEdge, CallGraphProvider},
        PhaseAttributes, LOWER_PHASE_ATTRIBUTE,
    },
    compiler::FunctionSweep,
    ir::{CallSiteId, CallTarget, Function, FunctionId, Instruction},
    Error, Result,
};

/// A module: the unit lowering operates on.
///
/// Functions live in slots indexed by [`FunctionId`]. Erasing a function empties its slot;
/// slots are never reused, so an identifier taken before an erase can be checked for liveness
/// afterwards. The module also tracks which function currently encloses each live call-site
/// handle, which makes revalidating a handle a map lookup.
///
/// # Examples
///
/// ```rust
/// use phaselower::ir::{Function, Module};
///
/// let mut module = Module::new("demo");
/// let leaf = module.add_function(Function::new("leaf").with_phase(1))?;
/// let top = module.add_function(Function::new("top").protected())?;
///
/// module.body(leaf)?.op("leaf.work").ret();
/// module.body(top)?.call(leaf).ret();
///
/// assert_eq!(module.call_sites_in(top).len(), 1);
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    functions: Vec<Option<Function>>,
    by_name: HashMap<String, FunctionId>,
    /// Live call-site handle -> function whose body contains it.
    sites: HashMap<CallSiteId, FunctionId>,
    next_site: u32,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the module's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a function and returns its identifier.
    ///
    /// Any call instructions already present in the function's body receive fresh call-site
    /// handles owned by this module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateFunction`] if a live function already has this name, and
    /// [`Error::IdentifiersExhausted`] if no function or call-site identifier is left.
    pub fn add_function(&mut self, mut function: Function) -> Result<FunctionId> {
        if self.by_name.contains_key(function.name()) {
            return Err(Error::DuplicateFunction(function.name().to_string()));
        }
        let index = u32::try_from(self.functions.len())
            .map_err(|_| Error::IdentifiersExhausted("function"))?;
        let id = FunctionId::new(index);
        function.id = id;

        if let Some(body) = function.body.take() {
            let calls = body.iter().filter(|instr| instr.call_site().is_some()).count();
            if !self.has_site_headroom(calls) {
                return Err(Error::IdentifiersExhausted("call-site"));
            }
            let renumbered = body
                .into_iter()
                .map(|instr| self.adopt_instruction(id, instr))
                .collect::<Result<Vec<_>>>()?;
            function.body = Some(renumbered);
        }

        self.by_name.insert(function.name().to_string(), id);
        self.functions.push(Some(function));
        Ok(id)
    }

    /// Returns a builder that appends instructions to the body of `function`.
    ///
    /// A declaration becomes a definition as soon as the builder is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `function` does not name a live function.
    pub fn body(&mut self, function: FunctionId) -> Result<BodyBuilder<'_>> {
        let slot = self
            .functions
            .get_mut(function.index())
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownFunction(function))?;
        slot.body.get_or_insert_with(Vec::new);

        Ok(BodyBuilder {
            module: self,
            function,
            error: None,
        })
    }

    /// Returns the function with the given identifier, if it is still live.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index()).and_then(Option::as_ref)
    }

    /// Looks up a live function by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).and_then(|id| self.function(*id))
    }

    /// Returns `true` if `id` names a live function.
    #[must_use]
    pub fn contains(&self, id: FunctionId) -> bool {
        self.function(id).is_some()
    }

    /// Iterates over live functions in module order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().flatten()
    }

    /// Returns the number of live functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions().count()
    }

    /// Returns `true` if the module has no live functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of instructions across all bodies.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.functions().map(Function::instruction_count).sum()
    }

    /// Resolves a call-site handle.
    ///
    /// # Returns
    ///
    /// The enclosing function and the call's current target, or `None` if the handle is stale.
    #[must_use]
    pub fn call_site(&self, site: CallSiteId) -> Option<(FunctionId, CallTarget)> {
        let (caller, position) = self.locate(site)?;
        match self.function(caller)?.body()?.get(position)? {
            Instruction::Call { target, .. } => Some((caller, *target)),
            _ => None,
        }
    }

    /// Returns the handles of all call instructions in `function`, in body order.
    #[must_use]
    pub fn call_sites_in(&self, function: FunctionId) -> Vec<CallSiteId> {
        self.function(function)
            .and_then(Function::body)
            .map(|body| body.iter().filter_map(Instruction::call_site).collect())
            .unwrap_or_default()
    }

    /// Returns the distinct functions whose bodies call or reference `function`.
    #[must_use]
    pub fn users_of(&self, function: FunctionId) -> Vec<FunctionId> {
        self.functions()
            .filter(|f| f.body().is_some_and(|b| b.iter().any(|i| i.uses(function))))
            .map(Function::id)
            .collect()
    }

    /// Removes a function from the module.
    ///
    /// Every call-site handle inside the removed body becomes stale. Call instructions in other
    /// functions that targeted it are left in place and now point at an empty slot.
    ///
    /// # Returns
    ///
    /// The removed function, or `None` if it was not live.
    pub fn remove_function(&mut self, id: FunctionId) -> Option<Function> {
        let function = self.functions.get_mut(id.index())?.take()?;

        for site in function.body().into_iter().flatten().filter_map(Instruction::call_site) {
            self.sites.remove(&site);
        }
        if self.by_name.get(function.name()) == Some(&id) {
            self.by_name.remove(function.name());
        }

        Some(function)
    }

    /// Allocates a fresh call-site handle enclosed by `owner`.
    ///
    /// Handles are never reused, so once the counter is spent allocation fails for good.
    pub(crate) fn allocate_site(&mut self, owner: FunctionId) -> Result<CallSiteId> {
        let site = CallSiteId::new(self.next_site);
        self.next_site = self
            .next_site
            .checked_add(1)
            .ok_or(Error::IdentifiersExhausted("call-site"))?;
        self.sites.insert(site, owner);
        Ok(site)
    }

    /// Returns `true` if `count` more handles can be allocated.
    pub(crate) fn has_site_headroom(&self, count: usize) -> bool {
        u32::try_from(count)
            .ok()
            .and_then(|count| self.next_site.checked_add(count))
            .is_some()
    }

    /// Drops a handle from the live set once its instruction is consumed.
    pub(crate) fn retire_site(&mut self, site: CallSiteId) {
        self.sites.remove(&site);
    }

    /// Finds the enclosing function and instruction index of a live handle.
    pub(crate) fn locate(&self, site: CallSiteId) -> Option<(FunctionId, usize)> {
        let owner = *self.sites.get(&site)?;
        let position = self
            .function(owner)?
            .body()?
            .iter()
            .position(|instr| instr.call_site() == Some(site))?;
        Some((owner, position))
    }

    pub(crate) fn body_mut(&mut self, id: FunctionId) -> Option<&mut Vec<Instruction>> {
        self.functions
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .and_then(|f| f.body.as_mut())
    }

    /// Gives call instructions entering this module handles of its own.
    pub(crate) fn adopt_instruction(
        &mut self,
        owner: FunctionId,
        instr: Instruction,
    ) -> Result<Instruction> {
        Ok(match instr {
            Instruction::Call { target, .. } => Instruction::Call {
                site: self.allocate_site(owner)?,
                target,
            },
            other => other,
        })
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for function in self.functions() {
            let phase = function
                .attribute(LOWER_PHASE_ATTRIBUTE)
                .map(|p| format!(" [phase {p}]"))
                .unwrap_or_default();
            match function.body() {
                None => writeln!(f, "declare {}{}", function.name(), phase)?,
                Some(body) => {
                    writeln!(f, "define {} ({}){} {{", function.name(), function.id(), phase)?;
                    for instr in body {
                        writeln!(f, "    {instr}")?;
                    }
                    writeln!(f, "}}")?;
                }
            }
        }
        Ok(())
    }
}

/// Appends instructions to one function body.
///
/// Created by [`Module::body`]. Calls get their handles at the moment they are appended. If the
/// module runs out of handles, the builder stops appending and [`BodyBuilder::finish`] reports
/// the error.
pub struct BodyBuilder<'a> {
    module: &'a mut Module,
    function: FunctionId,
    error: Option<Error>,
}

impl BodyBuilder<'_> {
    /// Appends an opaque instruction.
    pub fn op(mut self, text: impl Into<String>) -> Self {
        self.push(Instruction::Op(text.into()));
        self
    }

    /// Appends a direct call to `callee`.
    pub fn call(mut self, callee: FunctionId) -> Self {
        self.push_call(CallTarget::Direct(callee));
        self
    }

    /// Appends a call through a function pointer.
    pub fn call_indirect(mut self) -> Self {
        self.push_call(CallTarget::Indirect);
        self
    }

    /// Appends an address-of reference to `target`.
    pub fn reference(mut self, target: FunctionId) -> Self {
        self.push(Instruction::FunctionRef(target));
        self
    }

    /// Appends a return.
    pub fn ret(mut self) -> Self {
        self.push(Instruction::Return);
        self
    }

    /// Ends the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentifiersExhausted`] if a call could not be given a handle. Nothing
    /// was appended from that call on.
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn push_call(&mut self, target: CallTarget) {
        if self.error.is_some() {
            return;
        }
        match self.module.allocate_site(self.function) {
            Ok(site) => self.push(Instruction::Call { site, target }),
            Err(error) => self.error = Some(error),
        }
    }

    fn push(&mut self, instr: Instruction) {
        if self.error.is_some() {
            return;
        }
        if let Some(body) = self.module.body_mut(self.function) {
            body.push(instr);
        }
    }
}

impl CallGraphProvider for Module {
    fn function_ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.functions().map(Function::id)
    }

    fn has_body(&self, function: FunctionId) -> bool {
        self.function(function).is_some_and(Function::has_body)
    }

    fn function_name(&self, function: FunctionId) -> Option<&str> {
        self.function(function).map(Function::name)
    }

    fn call_edges(&self) -> impl Iterator<Item = CallEdge> + '_ {
        self.functions().flat_map(|function| {
            let caller = function.id();
            function
                .body()
                .into_iter()
                .flatten()
                .filter_map(move |instr| match instr {
                    Instruction::Call { site, target } => {
                        Some(CallEdge::new(caller, *target, *site))
                    }
                    _ => None,
                })
        })
    }

    fn current_callee(&self, site: CallSiteId) -> Option<FunctionId> {
        self.call_site(site).and_then(|(_, target)| target.function())
    }
}

impl PhaseAttributes for Module {
    fn phase_tag(&self, function: FunctionId) -> Option<&str> {
        self.function(function)?.attribute(LOWER_PHASE_ATTRIBUTE)
    }

    fn is_protected(&self, function: FunctionId) -> bool {
        self.function(function).is_some_and(Function::is_protected)
    }
}

impl FunctionSweep for Module {
    fn uses_in(&self, function: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.function(function)
            .and_then(Function::body)
            .into_iter()
            .flatten()
            .filter_map(Instruction::used_function)
    }

    fn erase_function(&mut self, function: FunctionId) -> bool {
        self.remove_function(function).is_some()
    }
}
