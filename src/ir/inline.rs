//! Body splicing for the reference module.
//!
//! This is the mechanical half of inlining: find the call instruction behind a handle, check
//! that the callee can be spliced, and replace the instruction with a copy of the callee's
//! body. Call instructions copied out of the callee are re-issued with fresh handles owned by
//! the caller, so the callee's own handles stay valid and unique.

use crate::{
    compiler::{InlineResult, Inliner},
    ir::{CallSiteId, CallTarget, Instruction, Module},
    Result,
};

impl Inliner for Module {
    fn inline(&mut self, site: CallSiteId) -> InlineResult {
        let Some((caller, position)) = self.locate(site) else {
            return InlineResult::failure("call site no longer exists");
        };
        let Some((_, target)) = self.call_site(site) else {
            return InlineResult::failure("call site no longer exists");
        };
        let CallTarget::Direct(callee) = target else {
            return InlineResult::failure("indirect call");
        };
        if callee == caller {
            return InlineResult::failure("recursive call site");
        }

        let Some(callee_fn) = self.function(callee) else {
            return InlineResult::failure("callee no longer exists");
        };
        let Some(callee_body) = callee_fn.body() else {
            return InlineResult::failure("callee has no body");
        };
        if !callee_fn.is_inlinable() {
            return InlineResult::failure("callee is marked noinline");
        }

        // Returns terminate the callee, not the caller
        let template: Vec<Instruction> = callee_body
            .iter()
            .filter(|instr| !matches!(instr, Instruction::Return))
            .cloned()
            .collect();

        let calls = template.iter().filter(|instr| instr.call_site().is_some()).count();
        if !self.has_site_headroom(calls) {
            return InlineResult::failure("call-site handles exhausted");
        }
        let spliced = match template
            .into_iter()
            .map(|instr| self.adopt_instruction(caller, instr))
            .collect::<Result<Vec<_>>>()
        {
            Ok(spliced) => spliced,
            Err(e) => return InlineResult::failure(e.to_string()),
        };

        let Some(body) = self.body_mut(caller) else {
            return InlineResult::failure("caller no longer exists");
        };
        body.splice(position..=position, spliced);
        self.retire_site(site);

        InlineResult::Success
    }
}
