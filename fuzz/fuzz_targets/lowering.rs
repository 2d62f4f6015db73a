#![no_main]

use libfuzzer_sys::fuzz_target;
use phaselower::{
    compiler::{InlineStrategy, LoweringConfig, TransformDriver},
    ir::{Function, FunctionId, Module},
    Error,
};

/// Decodes an arbitrary call graph of up to eight functions.
///
/// Per function one flag byte (body, phase, protection) and for functions with a body up to
/// three calls, each either direct to any function or indirect.
fn decode(data: &[u8]) -> Module {
    let mut bytes = data.iter().copied();
    let mut next = || bytes.next().unwrap_or(0);

    let mut module = Module::new("fuzz");
    let count = 1 + usize::from(next() % 8);

    let mut defined = Vec::new();
    for i in 0..count {
        let flags = next();
        let mut function = Function::new(format!("f{i}"));
        if flags & 0b0110 != 0b0110 {
            function = function.with_phase(u32::from((flags >> 1) & 0b11));
        }
        if flags & 0b1000 != 0 {
            function = function.protected();
        }
        let Ok(id) = module.add_function(function) else {
            continue;
        };
        if flags & 0b0001 != 0 {
            defined.push(id);
        }
    }

    for id in defined {
        let calls = next() % 4;
        let mut body = match module.body(id) {
            Ok(body) => body.op("work"),
            Err(_) => continue,
        };
        for _ in 0..calls {
            let target = next();
            body = if target & 0x80 != 0 {
                body.call_indirect()
            } else {
                body.call(FunctionId::new(u32::from(target) % count as u32))
            };
        }
        body.ret();
    }

    module
}

fuzz_target!(|data: &[u8]| {
    let module = decode(data);
    let phase = data.last().map_or(0, |b| u32::from(b % 3));
    let config = LoweringConfig::for_phase(phase).with_strict_invariants(false);

    // Bottom-up always terminates and a second run changes nothing
    let mut lowered = module.clone();
    let driver = TransformDriver::new(config.clone());
    let first = driver.run(&mut lowered).unwrap();
    assert!(first.residue.processed <= first.residue.total);
    assert_eq!(first.residue.is_empty(), first.residue.processed == first.residue.total);

    let size = lowered.instruction_count();
    let second = driver.run(&mut lowered).unwrap();
    assert!(!second.changed);
    assert_eq!(lowered.instruction_count(), size);

    // The fallback either converges or reports divergence
    let mut fallback = module;
    let capped = config.with_strategy(InlineStrategy::Fixpoint { max_iterations: 8 });
    match TransformDriver::new(capped).run(&mut fallback) {
        Ok(_) | Err(Error::FixpointDiverged { .. }) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
});
