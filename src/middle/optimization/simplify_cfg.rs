//! Control flow simplification.
//!
//! First, conditional branches on a constant condition are replaced by a jump
//! to the block that is always taken. Then every block ending in an
//! unconditional jump to a block which has no other predecessor is merged with
//! that block. Folding goes first since it is what usually leaves blocks with a
//! single predecessor.

use super::FunctionPass;
use crate::middle::lir::{self, BlockId, IrType, Opcode, Value};

#[derive(Debug, Default, Clone, Copy)]
pub struct SimplifyCfg;

impl FunctionPass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&mut self, function: &mut lir::Function) -> bool {
        simplify_cfg(function)
    }
}

pub fn simplify_cfg(function: &mut lir::Function) -> bool {
    let folded = fold_constant_branches(function);
    let merged = merge_blocks(function);

    folded || merged
}

/// Replaces `condbr <constant>, a, b` with a jump to the block that is
/// statically taken. Never adds or removes blocks, only edges.
fn fold_constant_branches(function: &mut lir::Function) -> bool {
    let mut changed = false;

    for block in function.block_ids() {
        let Some(terminator) = function.terminator(block) else {
            continue;
        };

        let inst = function.instruction(terminator);

        let Opcode::CondBranch {
            then_block,
            else_block,
        } = inst.opcode
        else {
            continue;
        };

        let Some(condition) = inst.operands()[0].as_constant() else {
            continue;
        };

        let (taken, dead) = if condition.is_truthy() {
            (then_block, else_block)
        } else {
            (else_block, then_block)
        };

        log::trace!("simplify-cfg: folding branch in {block} to {taken}");

        // Drops `block` from the predecessors of both targets before adding it
        // back to the taken one
        function.replace_instruction(
            terminator,
            Opcode::Branch { target: taken },
            IrType::Void,
            Vec::new(),
        );

        if dead != taken {
            for phi in function.phis(dead) {
                function.remove_phi_incoming(phi, block);
            }
        }

        changed = true;
    }

    changed
}

/// Merges straight line chains of blocks. Works from a snapshot of the block
/// order so removing blocks along the way is safe.
fn merge_blocks(function: &mut lir::Function) -> bool {
    let mut changed = false;

    for block in function.block_ids() {
        if !function.contains_block(block) {
            continue;
        }

        // Merging may expose another jump at the end of the grown block
        while let Some(successor) = mergeable_successor(function, block) {
            merge_into(function, block, successor);
            changed = true;
        }
    }

    changed
}

/// The successor of `block` if it is reached by an unconditional jump and
/// `block` is its only predecessor
fn mergeable_successor(function: &lir::Function, block: BlockId) -> Option<BlockId> {
    let terminator = function.terminator(block)?;

    let Opcode::Branch { target } = function.instruction(terminator).opcode else {
        return None;
    };

    let single_predecessor = function.block(target).predecessors().len() == 1;

    (target != block && target != function.entry() && single_predecessor).then_some(target)
}

fn merge_into(function: &mut lir::Function, block: BlockId, successor: BlockId) {
    log::trace!("simplify-cfg: merging {successor} into {block}");

    // With a single predecessor every phi has exactly one incoming value
    for phi in function.phis(successor) {
        let value: Value = function.instruction(phi).operands()[0];

        function.replace_all_uses_with(phi, value);
        function.erase_instruction(phi);
    }

    let jump = function
        .terminator(block)
        .expect("mergeable blocks end in a jump");
    function.erase_instruction(jump);

    function.splice_block(block, successor);
}
