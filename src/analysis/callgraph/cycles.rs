//! Call cycles among functions the worklist could not resolve.
//!
//! When bottom-up inlining finishes with functions still waiting on callees, the reason is
//! always a call cycle: either the function is part of one, or it (transitively) calls into
//! one. This module separates the two by computing strongly connected components over the
//! unresolved functions with Tarjan's algorithm.

use std::collections::{BTreeMap, BTreeSet};

use crate::{analysis::callgraph::CallGraphIndex, ir::FunctionId};

/// Finds the call cycles among `unresolved` functions.
///
/// # Arguments
///
/// * `index` - The call-graph snapshot the worklist ran on
/// * `unresolved` - Functions left with a non-zero out-call count
///
/// # Returns
///
/// The non-trivial strongly connected components (more than one member, or a single member
/// that calls itself), each sorted by [`FunctionId`]. Components are returned in reverse
/// topological order: a cycle that calls into another cycle comes after it.
///
/// # Complexity
///
/// O((V + E) log V) over the unresolved subgraph. The search is iterative, so a cycle of any
/// length is diagnosed without growing the call stack.
#[must_use]
pub fn find_call_cycles(index: &CallGraphIndex, unresolved: &[FunctionId]) -> Vec<Vec<FunctionId>> {
    let members: BTreeSet<FunctionId> = unresolved.iter().copied().collect();
    if members.is_empty() {
        return Vec::new();
    }

    // Forward edges restricted to the unresolved subgraph
    let successors: BTreeMap<FunctionId, Vec<FunctionId>> = members
        .iter()
        .map(|caller| {
            let callees = index
                .callees_of(*caller)
                .filter(|callee| members.contains(callee))
                .collect();
            (*caller, callees)
        })
        .collect();

    let mut state = TarjanState::default();
    for node in &members {
        if !state.index.contains_key(node) {
            state.strongconnect(&successors, *node);
        }
    }

    state
        .sccs
        .into_iter()
        .filter(|scc| {
            scc.len() > 1
                || successors
                    .get(&scc[0])
                    .is_some_and(|callees| callees.contains(&scc[0]))
        })
        .map(|mut scc| {
            scc.sort();
            scc
        })
        .collect()
}

/// Internal state for Tarjan's algorithm.
#[derive(Default)]
struct TarjanState {
    /// Discovery index of each visited node
    index: BTreeMap<FunctionId, usize>,
    /// Lowlink value of each visited node
    lowlink: BTreeMap<FunctionId, usize>,
    /// Nodes currently on the stack
    on_stack: BTreeSet<FunctionId>,
    stack: Vec<FunctionId>,
    current_index: usize,
    sccs: Vec<Vec<FunctionId>>,
}

impl TarjanState {
    /// Runs the depth-first search from `root` with an explicit frame stack.
    ///
    /// Each frame holds a node and the position of the next successor to visit, so call chains
    /// of any length are handled without recursion.
    fn strongconnect(
        &mut self,
        successors: &BTreeMap<FunctionId, Vec<FunctionId>>,
        root: FunctionId,
    ) {
        let mut frames: Vec<(FunctionId, usize)> = vec![(root, 0)];
        self.discover(root);

        while let Some(frame) = frames.last_mut() {
            let (v, next) = *frame;
            let callees = successors.get(&v).map_or(&[][..], Vec::as_slice);

            if let Some(&w) = callees.get(next) {
                frame.1 += 1;
                if !self.index.contains_key(&w) {
                    self.discover(w);
                    frames.push((w, 0));
                } else if self.on_stack.contains(&w) {
                    let reach = self.index[&w];
                    self.lower(v, reach);
                }
                continue;
            }

            frames.pop();
            let low = self.lowlink[&v];
            if let Some(&(parent, _)) = frames.last() {
                self.lower(parent, low);
            }

            if low == self.index[&v] {
                let mut scc = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    fn discover(&mut self, v: FunctionId) {
        self.index.insert(v, self.current_index);
        self.lowlink.insert(v, self.current_index);
        self.current_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);
    }

    fn lower(&mut self, v: FunctionId, value: usize) {
        if let Some(low) = self.lowlink.get_mut(&v) {
            *low = (*low).min(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::callgraph::{find_call_cycles, CallGraphIndex},
        ir::{Function, Module},
        test::factories,
    };

    #[test]
    fn test_no_unresolved_no_cycles() {
        let (module, _) = factories::nested_scenario();
        let index = CallGraphIndex::build(&module);
        assert!(find_call_cycles(&index, &[]).is_empty());
    }

    #[test]
    fn test_mutual_recursion_is_one_cycle() {
        let (module, a, b) = factories::mutual_cycle(2);
        let index = CallGraphIndex::build(&module);
        assert_eq!(find_call_cycles(&index, &[a, b]), vec![vec![a, b]]);
    }

    #[test]
    fn test_blocked_caller_is_not_a_cycle_member() {
        let mut module = Module::new("m");
        let a = module.add_function(Function::new("a").with_phase(1)).unwrap();
        let b = module.add_function(Function::new("b").with_phase(1)).unwrap();
        let top = module.add_function(Function::new("top").protected()).unwrap();
        module.body(a).unwrap().call(b).ret();
        module.body(b).unwrap().call(a).ret();
        module.body(top).unwrap().call(a).ret();

        let index = CallGraphIndex::build(&module);
        let cycles = find_call_cycles(&index, &[a, b, top]);
        assert_eq!(cycles, vec![vec![a, b]]);
    }

    #[test]
    fn test_self_recursion_and_separate_cycles() {
        let mut module = Module::new("m");
        let selfish = module.add_function(Function::new("selfish")).unwrap();
        let x = module.add_function(Function::new("x")).unwrap();
        let y = module.add_function(Function::new("y")).unwrap();
        let z = module.add_function(Function::new("z")).unwrap();
        module.body(selfish).unwrap().call(selfish).ret();
        module.body(x).unwrap().call(y).ret();
        module.body(y).unwrap().call(z).ret();
        module.body(z).unwrap().call(x).call(selfish).ret();

        let index = CallGraphIndex::build(&module);
        let cycles = find_call_cycles(&index, &[selfish, x, y, z]);

        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0], vec![selfish]);
        assert_eq!(cycles[1], vec![x, y, z]);
    }

    #[test]
    fn test_long_ring_is_one_cycle() {
        let mut module = Module::new("ring");
        let ids: Vec<_> = (0..100_000)
            .map(|i| module.add_function(Function::new(format!("r{i}"))).unwrap())
            .collect();
        for (i, &id) in ids.iter().enumerate() {
            module.body(id).unwrap().call(ids[(i + 1) % ids.len()]).ret();
        }

        let index = CallGraphIndex::build(&module);
        let cycles = find_call_cycles(&index, &ids);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], ids);
    }

    #[test]
    fn test_long_chain_into_cycle() {
        let mut module = Module::new("chain");
        let a = module.add_function(Function::new("a")).unwrap();
        let b = module.add_function(Function::new("b")).unwrap();
        module.body(a).unwrap().call(b).ret();
        module.body(b).unwrap().call(a).ret();

        let chain: Vec<_> = (0..50_000)
            .map(|i| module.add_function(Function::new(format!("c{i}"))).unwrap())
            .collect();
        for pair in chain.windows(2) {
            module.body(pair[0]).unwrap().call(pair[1]).ret();
        }
        if let Some(&last) = chain.last() {
            module.body(last).unwrap().call(a).ret();
        }

        // Searching from c0 walks the whole chain before reaching the cycle
        let unresolved: Vec<_> = chain.iter().copied().chain([a, b]).collect();
        let index = CallGraphIndex::build(&module);
        assert_eq!(find_call_cycles(&index, &unresolved), vec![vec![a, b]]);
    }
}
