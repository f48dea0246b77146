//! Dead code elimination. Removes instructions whose result is never used and
//! which have no side effects, then keeps going with the operands that became
//! dead because of it.

use hashbrown::HashSet;

use super::FunctionPass;
use crate::middle::lir::{self, InstId};

#[derive(Debug, Default, Clone, Copy)]
pub struct DeadCodeElimination;

impl FunctionPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, function: &mut lir::Function) -> bool {
        eliminate_dead_code(function)
    }
}

/// Instructions waiting to be erased. Order does not matter since an
/// instruction's deadness only depends on its own use-list.
#[derive(Debug, Default)]
struct Worklist {
    stack: Vec<InstId>,
    pending: HashSet<InstId>,
}

impl Worklist {
    fn insert(&mut self, instruction: InstId) {
        if self.pending.insert(instruction) {
            self.stack.push(instruction);
        }
    }

    fn contains(&self, instruction: InstId) -> bool {
        self.pending.contains(&instruction)
    }

    fn pop(&mut self) -> Option<InstId> {
        let instruction = self.stack.pop()?;
        self.pending.remove(&instruction);
        Some(instruction)
    }
}

pub fn eliminate_dead_code(function: &mut lir::Function) -> bool {
    let mut worklist = Worklist::default();
    let mut erased = 0;

    for instruction in function.instruction_ids() {
        if worklist.contains(instruction) || !function.is_live(instruction) {
            continue;
        }

        if function.instruction(instruction).is_trivially_dead() {
            erase_and_collect(function, instruction, &mut worklist);
            erased += 1;
        }
    }

    while let Some(instruction) = worklist.pop() {
        if function.is_live(instruction) && function.instruction(instruction).is_trivially_dead()
        {
            erase_and_collect(function, instruction, &mut worklist);
            erased += 1;
        }
    }

    if erased > 0 {
        log::debug!(
            "dce: erased {erased} instruction(s) from `{}`",
            function.name
        );
    }

    erased > 0
}

/// Erases a dead instruction and queues any operand it was the last user of
fn erase_and_collect(function: &mut lir::Function, instruction: InstId, worklist: &mut Worklist) {
    let operands = function
        .instruction(instruction)
        .operands()
        .iter()
        .filter_map(lir::Value::as_instruction)
        .collect::<Vec<_>>();

    log::trace!("dce: erasing {instruction}");
    function.erase_instruction(instruction);

    for operand in operands {
        if function.is_live(operand) && function.instruction(operand).is_trivially_dead() {
            worklist.insert(operand);
        }
    }
}
