//! Integration tests for phase lowering through the public API.
//!
//! Each test builds a small module by hand, runs the driver (or the pipeline) on it, and checks
//! the properties a lowering run guarantees: bottom-up flattening, removal of dead phase
//! functions, tolerance of call cycles, and idempotence.

use phaselower::{
    analysis::callgraph::CallGraphIndex,
    compiler::{EventKind, InlineStrategy, LoweringConfig, LoweringPipeline, TransformDriver},
    ir::{CallSiteId, Function, FunctionFlags, FunctionId, Instruction, Module},
    prelude::*,
    Error, Result,
};

fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn lower(module: &mut Module, phase: u32) -> Result<LoweringOutcome> {
    init_logging();
    TransformDriver::new(LoweringConfig::for_phase(phase)).run(module)
}

/// Opaque ops of a function body, in order.
fn ops(module: &Module, name: &str) -> Vec<String> {
    module
        .function_by_name(name)
        .and_then(Function::body)
        .into_iter()
        .flatten()
        .filter_map(|instr| match instr {
            Instruction::Op(op) => Some(op.clone()),
            _ => None,
        })
        .collect()
}

fn names(module: &Module) -> Vec<&str> {
    module.functions().map(Function::name).collect()
}

/// No call anywhere in the module targets a function tagged with `phase`.
fn no_calls_into_phase(module: &Module, phase: u32) -> bool {
    let tag = phase.to_string();
    module.functions().all(|f| {
        f.direct_callees().all(|callee| {
            module
                .function(callee)
                .and_then(|c| c.attribute("lower-phase"))
                != Some(tag.as_str())
        })
    })
}

/// `d` <- `c` <- {`a`, `b`} <- `top`, plus untagged `u` called by `a` and calling `d`.
/// Everything except `u` and `top` is tagged with phase 1.
fn diamond() -> Result<Module> {
    let mut module = Module::new("diamond");
    let d = module.add_function(Function::new("d").with_phase(1))?;
    let c = module.add_function(Function::new("c").with_phase(1))?;
    let u = module.add_function(Function::new("u"))?;
    let a = module.add_function(Function::new("a").with_phase(1))?;
    let b = module.add_function(Function::new("b").with_phase(1))?;
    let top = module.add_function(Function::new("top").protected())?;

    module.body(d)?.op("d.work").ret();
    module.body(c)?.op("c.work").call(d).ret();
    module.body(u)?.op("u.work").call(d).ret();
    module.body(a)?.op("a.work").call(c).call(u).ret();
    module.body(b)?.op("b.work").call(c).ret();
    module.body(top)?.call(a).call(b).ret();

    Ok(module)
}

#[test]
fn test_leaf_mid_top_scenario() -> Result<()> {
    let mut module = Module::new("scenario");
    let leaf = module.add_function(Function::new("leaf").with_phase(1))?;
    let mid = module.add_function(Function::new("mid").with_phase(1))?;
    let top = module.add_function(Function::new("top").with_phase(0).protected())?;
    module.body(leaf)?.op("leaf.work").ret();
    module.body(mid)?.op("mid.before").call(leaf).op("mid.after").ret();
    module.body(top)?.op("top.before").call(mid).op("top.after").ret();

    let outcome = lower(&mut module, 1)?;

    assert!(outcome.changed);
    assert_eq!(outcome.inlined, 2);
    assert!(outcome.was_removed("leaf"));
    assert!(outcome.was_removed("mid"));
    assert_eq!(names(&module), vec!["top"]);
    assert!(module.contains(top));
    assert_eq!(
        ops(&module, "top"),
        vec!["top.before", "mid.before", "leaf.work", "mid.after", "top.after"]
    );
    assert!(module.call_sites_in(top).is_empty());
    Ok(())
}

#[test]
fn test_mutual_recursion_scenario() -> Result<()> {
    let mut module = Module::new("cycle");
    let a = module.add_function(Function::new("a").with_phase(2))?;
    let b = module.add_function(Function::new("b").with_phase(2))?;
    module.body(a)?.op("a.work").call(b).ret();
    module.body(b)?.op("b.work").call(a).ret();
    let before = module.instruction_count();

    let outcome = lower(&mut module, 2)?;

    assert!(module.contains(a));
    assert!(module.contains(b));
    assert!(outcome.residue.processed < outcome.residue.total);
    assert_eq!(outcome.residue.cycles, vec![vec![a, b]]);
    assert!(outcome.events.has(EventKind::CycleDetected));
    assert_eq!(module.instruction_count(), before);
    assert_eq!(module.function(a).unwrap().direct_callees().collect::<Vec<_>>(), vec![b]);
    Ok(())
}

#[test]
fn test_acyclic_completeness() -> Result<()> {
    let mut module = diamond()?;
    let outcome = lower(&mut module, 1)?;

    assert!(outcome.changed);
    assert!(outcome.residue.is_empty());
    assert_eq!(outcome.residue.processed, outcome.residue.total);
    assert!(no_calls_into_phase(&module, 1));

    let removed: Vec<_> = outcome.removed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(removed, vec!["d", "c", "a", "b"]);
    assert_eq!(names(&module), vec!["u", "top"]);
    assert_eq!(
        ops(&module, "top"),
        vec!["a.work", "c.work", "d.work", "b.work", "c.work", "d.work"]
    );
    assert_eq!(ops(&module, "u"), vec!["u.work", "d.work"]);
    Ok(())
}

#[test]
fn test_second_run_is_idempotent() -> Result<()> {
    let mut module = diamond()?;
    lower(&mut module, 1)?;
    let snapshot = module.to_string();

    let outcome = lower(&mut module, 1)?;
    assert!(!outcome.changed);
    assert_eq!(outcome.preserved(), Preserved::All);
    assert_eq!(outcome.inlined, 0);
    assert!(outcome.removed.is_empty());
    assert_eq!(module.to_string(), snapshot);
    Ok(())
}

#[test]
fn test_cycle_with_external_caller_is_preserved() -> Result<()> {
    let mut module = Module::new("m");
    let a = module.add_function(Function::new("a").with_phase(2))?;
    let b = module.add_function(Function::new("b").with_phase(2))?;
    let main = module.add_function(Function::new("main").protected())?;
    module.body(a)?.call(b).ret();
    module.body(b)?.call(a).ret();
    module.body(main)?.call(a).ret();
    let before = module.to_string();

    for _ in 0..3 {
        let outcome = lower(&mut module, 2)?;
        assert!(!outcome.changed);
        // main is blocked behind the cycle without being part of it
        assert_eq!(outcome.residue.unresolved, vec![a, b, main]);
        assert_eq!(outcome.residue.cycles, vec![vec![a, b]]);
        assert!(!outcome.residue.in_cycle(main));
    }
    assert_eq!(module.to_string(), before);
    Ok(())
}

#[test]
fn test_partial_inline_before_cycle() -> Result<()> {
    let mut module = Module::new("m");
    let helper = module.add_function(Function::new("helper").with_phase(2))?;
    let a = module.add_function(Function::new("a").with_phase(2))?;
    let b = module.add_function(Function::new("b").with_phase(2))?;
    module.body(helper)?.op("helper.work").ret();
    module.body(a)?.call(helper).call(b).ret();
    module.body(b)?.call(a).ret();

    let outcome = lower(&mut module, 2)?;

    // helper is resolved and spliced into a; the cycle itself stays
    assert!(outcome.changed);
    assert_eq!(outcome.inlined, 1);
    assert!(outcome.was_removed("helper"));
    assert_eq!(names(&module), vec!["a", "b"]);
    assert_eq!(ops(&module, "a"), vec!["helper.work"]);
    assert_eq!(outcome.residue.processed, 1);
    assert_eq!(outcome.residue.total, 3);

    let again = lower(&mut module, 2)?;
    assert!(!again.changed);
    Ok(())
}

#[test]
fn test_declaration_isolation() -> Result<()> {
    let mut module = Module::new("m");
    let decl = module.add_function(Function::new("external").with_phase(1))?;
    let main = module.add_function(Function::new("main").protected())?;
    module.body(main)?.call(decl).call(decl).ret();

    let index = CallGraphIndex::build(&module);
    assert_eq!(index.pending_out_calls(main), Some(0));
    assert!(!index.contains(decl));

    let outcome = lower(&mut module, 1)?;
    assert!(!outcome.changed);
    assert_eq!(outcome.events.count_kind(EventKind::InlineFailed), 0);
    assert_eq!(module.call_sites_in(main).len(), 2);
    assert!(module.contains(decl));
    Ok(())
}

#[test]
fn test_protected_phase_function_is_never_removed() -> Result<()> {
    let mut module = Module::new("m");
    let entry = module.add_function(Function::new("entry").with_phase(1).protected())?;
    let helper = module.add_function(Function::new("helper").with_phase(1))?;
    module.body(entry)?.op("entry.work").ret();
    module.body(helper)?.op("helper.work").ret();

    init_logging();
    match TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module) {
        Err(Error::InvariantViolation(message)) => assert!(message.contains("entry")),
        other => panic!("expected invariant violation, got {other:?}"),
    }
    assert_eq!(module.len(), 2);

    let config = LoweringConfig::for_phase(1).with_strict_invariants(false);
    let outcome = TransformDriver::new(config).run(&mut module)?;
    assert!(module.contains(entry));
    assert!(!module.contains(helper));
    assert_eq!(outcome.stats().invariant_violations, 1);
    Ok(())
}

#[test]
fn test_malformed_phase_tag_is_fatal() -> Result<()> {
    let mut module = diamond()?;
    module.add_function(Function::new("corrupt").with_attribute("lower-phase", "-3"))?;
    let snapshot = module.to_string();

    let result = lower(&mut module, 1);
    assert!(matches!(result, Err(Error::Malformed { .. })));
    assert_eq!(module.to_string(), snapshot);
    Ok(())
}

#[test]
fn test_trace_records_every_attempt() -> Result<()> {
    let mut module = diamond()?;
    let outcome = lower(&mut module, 1)?;

    let attempts: Vec<_> = outcome
        .events
        .filter_kind(EventKind::FunctionInlined)
        .map(|e| (e.caller.is_some(), e.function.is_some(), e.phase))
        .collect();
    assert_eq!(attempts.len(), 6);
    assert!(attempts.iter().all(|a| *a == (true, true, Some(1))));

    let stats = outcome.stats();
    assert_eq!(stats.inlined, 6);
    assert_eq!(stats.removed, 4);
    assert_eq!(stats.inline_failures, 0);
    assert_eq!(outcome.events.summary(), "6 function inlined, 4 function removed");
    Ok(())
}

#[test]
fn test_fixpoint_strategy_reaches_same_module() -> Result<()> {
    let mut bottom_up = diamond()?;
    let mut fixpoint = diamond()?;

    lower(&mut bottom_up, 1)?;
    let config = LoweringConfig::for_phase(1).with_strategy(InlineStrategy::fixpoint());
    let outcome = TransformDriver::new(config).run(&mut fixpoint)?;

    assert!(outcome.changed);
    assert_eq!(names(&fixpoint), names(&bottom_up));
    assert_eq!(ops(&fixpoint, "top"), ops(&bottom_up, "top"));
    assert!(no_calls_into_phase(&fixpoint, 1));
    Ok(())
}

#[test]
fn test_fixpoint_strategy_reports_divergence() -> Result<()> {
    let mut module = Module::new("m");
    let a = module.add_function(Function::new("a").with_phase(1))?;
    let b = module.add_function(Function::new("b").with_phase(1))?;
    let c = module.add_function(Function::new("c").with_phase(1))?;
    module.body(a)?.call(b).ret();
    module.body(b)?.call(c).ret();
    module.body(c)?.call(a).ret();

    let config = LoweringConfig::for_phase(1)
        .with_strategy(InlineStrategy::Fixpoint { max_iterations: 6 });
    let result = TransformDriver::new(config).run(&mut module);

    assert!(matches!(
        result,
        Err(Error::FixpointDiverged {
            phase: 1,
            iterations: 6
        })
    ));
    // Bodies stay bounded: the cycle only ever holds one call per function
    assert!(module.functions().all(|f| f.instruction_count() <= 2));
    Ok(())
}

#[test]
fn test_large_ring_is_left_in_place() -> Result<()> {
    const RING: usize = 100_000;
    let mut module = Module::new("ring");
    let ids = (0..RING)
        .map(|i| module.add_function(Function::new(format!("r{i}")).with_phase(1)))
        .collect::<Result<Vec<_>>>()?;
    for (i, &id) in ids.iter().enumerate() {
        module.body(id)?.op("step").call(ids[(i + 1) % RING]).ret();
    }
    let before = module.instruction_count();

    let outcome = lower(&mut module, 1)?;

    assert!(!outcome.changed);
    assert_eq!(outcome.residue.processed, 0);
    assert_eq!(outcome.residue.total, RING);
    assert_eq!(outcome.residue.unresolved.len(), RING);
    assert_eq!(outcome.residue.cycles.len(), 1);
    assert_eq!(outcome.residue.cycles[0].len(), RING);
    assert!(outcome.removed.is_empty());
    assert_eq!(module.len(), RING);
    assert_eq!(module.instruction_count(), before);
    Ok(())
}

#[test]
fn test_long_uninlinable_chain_is_swept() -> Result<()> {
    const CHAIN: usize = 5_000;
    let mut module = Module::new("chain");
    let mut ids = Vec::with_capacity(CHAIN);
    for i in 0..CHAIN {
        let f = module.add_function(
            Function::new(format!("c{i}"))
                .with_phase(1)
                .with_flags(FunctionFlags::NO_INLINE),
        )?;
        let body = module.body(f)?.op(format!("work {i}"));
        match ids.last() {
            Some(&below) => body.call(below).ret(),
            None => body.ret(),
        };
        ids.push(f);
    }

    let outcome = lower(&mut module, 1)?;

    assert_eq!(outcome.inlined, 0);
    assert_eq!(outcome.failed, CHAIN - 1);
    assert!(outcome.residue.is_empty());
    assert_eq!(outcome.residue.processed, CHAIN);
    assert_eq!(outcome.removed.len(), CHAIN);
    assert_eq!(outcome.removed.first().map(|r| r.id), ids.last().copied());
    assert!(module.is_empty());
    Ok(())
}

#[test]
fn test_pipeline_lowers_phases_in_order() -> Result<()> {
    let mut module = Module::new("m");
    let p1 = module.add_function(Function::new("p1").with_phase(1))?;
    let p2 = module.add_function(Function::new("p2").with_phase(2))?;
    let p3 = module.add_function(Function::new("p3").with_phase(3))?;
    let main = module.add_function(Function::new("main").protected())?;
    module.body(p1)?.op("one").ret();
    module.body(p2)?.op("two").call(p1).ret();
    module.body(p3)?.op("three").call(p2).ret();
    module.body(main)?.call(p3).ret();

    init_logging();
    let outcome = LoweringPipeline::new(LoweringConfig::default())
        .with_phases([3, 2, 1])
        .run(&mut module)?;

    assert!(outcome.changed());
    assert_eq!(outcome.removed().collect::<Vec<_>>(), vec!["p3", "p2", "p1"]);
    assert_eq!(names(&module), vec!["main"]);
    assert_eq!(ops(&module, "main"), vec!["three", "two", "one"]);
    assert_eq!(outcome.inlined(), 3);
    Ok(())
}

/// A module wrapper whose inliner refuses one callee.
struct Stubborn {
    module: Module,
    refuse: FunctionId,
}

impl CallGraphProvider for Stubborn {
    fn function_ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.module.function_ids()
    }

    fn has_body(&self, function: FunctionId) -> bool {
        self.module.has_body(function)
    }

    fn function_name(&self, function: FunctionId) -> Option<&str> {
        self.module.function_name(function)
    }

    fn call_edges(&self) -> impl Iterator<Item = phaselower::analysis::callgraph::CallEdge> + '_ {
        self.module.call_edges()
    }

    fn current_callee(&self, site: CallSiteId) -> Option<FunctionId> {
        self.module.current_callee(site)
    }
}

impl PhaseAttributes for Stubborn {
    fn phase_tag(&self, function: FunctionId) -> Option<&str> {
        self.module.phase_tag(function)
    }

    fn is_protected(&self, function: FunctionId) -> bool {
        PhaseAttributes::is_protected(&self.module, function)
    }
}

impl Inliner for Stubborn {
    fn inline(&mut self, site: CallSiteId) -> InlineResult {
        if self.module.current_callee(site) == Some(self.refuse) {
            return InlineResult::failure("unsupported call shape");
        }
        self.module.inline(site)
    }
}

impl FunctionSweep for Stubborn {
    fn uses_in(&self, function: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.module.uses_in(function)
    }

    fn erase_function(&mut self, function: FunctionId) -> bool {
        self.module.erase_function(function)
    }
}

#[test]
fn test_refused_inline_keeps_pass_going_and_idempotent() -> Result<()> {
    let mut module = Module::new("m");
    let leaf = module.add_function(Function::new("leaf").with_phase(1))?;
    let mid = module.add_function(Function::new("mid").with_phase(1))?;
    let top = module.add_function(Function::new("top").protected())?;
    module.body(leaf)?.op("leaf.work").ret();
    module.body(mid)?.op("mid.work").call(leaf).ret();
    module.body(top)?.call(mid).ret();

    let mut target = Stubborn {
        module,
        refuse: leaf,
    };
    init_logging();
    let driver = TransformDriver::new(LoweringConfig::for_phase(1));

    let first = driver.run(&mut target)?;
    assert!(first.changed);
    assert_eq!(first.inlined, 1);
    assert_eq!(first.failed, 1);
    assert!(first.was_removed("mid"));
    assert!(!first.was_removed("leaf"));

    let failure = first
        .events
        .filter_kind(EventKind::InlineFailed)
        .next()
        .map(|e| (e.caller, e.function, e.message.clone()));
    assert_eq!(
        failure,
        Some((
            Some(mid),
            Some(leaf),
            "failed to inline leaf into mid: unsupported call shape".to_string()
        ))
    );

    // top now calls leaf directly; the refusal repeats but nothing changes
    assert_eq!(
        target.module.function(top).unwrap().direct_callees().collect::<Vec<_>>(),
        vec![leaf]
    );
    let snapshot = target.module.to_string();
    let second = driver.run(&mut target)?;
    assert!(!second.changed);
    assert_eq!(second.failed, 1);
    assert_eq!(target.module.to_string(), snapshot);
    Ok(())
}
