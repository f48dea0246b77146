//! Rewrites multiplications by a power of two into left shifts

use super::FunctionPass;
use crate::middle::lir::{self, Constant, Opcode, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct StrengthReduction;

impl FunctionPass for StrengthReduction {
    fn name(&self) -> &'static str {
        "strength-reduction"
    }

    fn run(&mut self, function: &mut lir::Function) -> bool {
        reduce_strength(function)
    }
}

pub fn reduce_strength(function: &mut lir::Function) -> bool {
    let mut changed = false;

    for instruction in function.instruction_ids() {
        let inst = function.instruction(instruction);

        if inst.opcode != Opcode::Mul {
            continue;
        }

        let &[lhs, rhs] = inst.operands() else {
            continue;
        };

        // The left operand wins if both are powers of two
        let (base, amount) = if let Some(amount) = shift_amount(lhs) {
            (rhs, amount)
        } else if let Some(amount) = shift_amount(rhs) {
            (lhs, amount)
        } else {
            continue;
        };

        log::trace!("strength reduction: {instruction} becomes shl by {amount}");

        let ty = inst.ty;
        function.replace_instruction(instruction, Opcode::Shl, ty, vec![base, Value::int(amount)]);
        changed = true;
    }

    changed
}

/// log2 of an integer constant which is a power of two greater than one
fn shift_amount(value: Value) -> Option<i64> {
    let Value::Constant(Constant::Int(value)) = value else {
        return None;
    };

    (value > 1 && value.count_ones() == 1).then(|| value.trailing_zeros() as i64)
}
