use std::collections::BTreeSet;

use hashbrown::HashMap;

use super::{BlockId, Function, InstId, Opcode, Value};

/// A broken structural invariant of a [`Function`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("block {block} does not end in a terminator")]
    MissingTerminator { block: BlockId },
    #[error("terminator {instruction} is not the last instruction of block {block}")]
    MisplacedTerminator { block: BlockId, instruction: InstId },
    #[error("instruction {instruction} is listed in block {listed} but belongs to {recorded}")]
    WrongBlock {
        instruction: InstId,
        listed: BlockId,
        recorded: BlockId,
    },
    #[error("instruction {instruction} uses erased instruction {operand}")]
    DanglingOperand {
        instruction: InstId,
        operand: InstId,
    },
    #[error("use-list of instruction {definition} does not match its users' operands")]
    UseListMismatch { definition: InstId },
    #[error("instruction {instruction} branches to removed block {target}")]
    DanglingSuccessor {
        instruction: InstId,
        target: BlockId,
    },
    #[error("predecessors of block {block} do not match the branches into it")]
    PredecessorMismatch { block: BlockId },
    #[error("phi {phi} does not have exactly one entry per predecessor")]
    PhiIncomingMismatch { phi: InstId },
    #[error("instruction {instruction} is not listed in any live block")]
    Unlisted { instruction: InstId },
}

impl Function {
    /// Checks the structural invariants every pass must preserve
    pub fn verify(&self) -> Result<(), VerifyError> {
        let mut expected_users: HashMap<InstId, Vec<InstId>> = HashMap::new();
        let mut expected_predecessors: HashMap<BlockId, BTreeSet<BlockId>> = HashMap::new();

        for &block in &self.layout {
            let instructions = self.block(block).instructions();

            let Some(&last) = instructions.last() else {
                return Err(VerifyError::MissingTerminator { block });
            };

            if !self.instruction(last).is_terminator() {
                return Err(VerifyError::MissingTerminator { block });
            }

            for &id in instructions {
                let instruction = self.instruction(id);

                if instruction.block != block {
                    return Err(VerifyError::WrongBlock {
                        instruction: id,
                        listed: block,
                        recorded: instruction.block,
                    });
                }

                if instruction.is_terminator() && id != last {
                    return Err(VerifyError::MisplacedTerminator {
                        block,
                        instruction: id,
                    });
                }

                for operand in instruction
                    .operands
                    .iter()
                    .filter_map(Value::as_instruction)
                {
                    if !self.is_live(operand) {
                        return Err(VerifyError::DanglingOperand {
                            instruction: id,
                            operand,
                        });
                    }

                    expected_users.entry(operand).or_default().push(id);
                }

                for target in instruction.opcode.successors() {
                    if !self.contains_block(target) {
                        return Err(VerifyError::DanglingSuccessor {
                            instruction: id,
                            target,
                        });
                    }

                    expected_predecessors
                        .entry(target)
                        .or_default()
                        .insert(block);
                }
            }
        }

        for &block in &self.layout {
            let expected = expected_predecessors.remove(&block).unwrap_or_default();

            if self.block(block).predecessors != expected {
                return Err(VerifyError::PredecessorMismatch { block });
            }

            for phi in self.phis(block) {
                let Opcode::Phi { incoming } = &self.instruction(phi).opcode else {
                    unreachable!()
                };

                let unique = incoming.iter().copied().collect::<BTreeSet<_>>();

                if unique.len() != incoming.len()
                    || unique != expected
                    || incoming.len() != self.instruction(phi).operands.len()
                {
                    return Err(VerifyError::PhiIncomingMismatch { phi });
                }
            }

            for &id in self.block(block).instructions() {
                let mut recorded = self.instruction(id).users.clone();
                let mut expected = expected_users.remove(&id).unwrap_or_default();

                recorded.sort();
                expected.sort();

                if recorded != expected {
                    return Err(VerifyError::UseListMismatch { definition: id });
                }
            }
        }

        for (id, instruction) in self.instructions.enumerate() {
            let Some(instruction) = instruction else {
                continue;
            };

            if !self.contains_block(instruction.block)
                || !self.block(instruction.block).instructions.contains(&id)
            {
                return Err(VerifyError::Unlisted { instruction: id });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::lir::{FunctionBuilder, IrType};

    #[test]
    fn unterminated_block_is_rejected() {
        let mut function = Function::new("open", vec![IrType::Int], IrType::Int);
        let mut builder = FunctionBuilder::new(&mut function);

        let x = builder.parameter(0);
        builder.add(x, x);

        let entry = function.entry();
        assert_eq!(
            function.verify(),
            Err(VerifyError::MissingTerminator { block: entry })
        );
    }

    #[test]
    fn diamond_with_phi_verifies() {
        let mut function = Function::new("diamond", vec![IrType::Bool], IrType::Int);
        let mut builder = FunctionBuilder::new(&mut function);

        let entry = builder.current_block();
        let left = builder.create_block();
        let right = builder.create_block();
        let join = builder.create_block();

        let condition = builder.parameter(0);
        builder.cond_branch(condition, left, right);

        builder.position_at_end(left);
        builder.branch(join);
        builder.position_at_end(right);
        builder.branch(join);

        builder.position_at_end(join);
        let merged = builder.phi(
            IrType::Int,
            &[(Value::int(1), left), (Value::int(2), right)],
        );
        builder.ret(Some(merged));

        assert_eq!(function.verify(), Ok(()));
        assert_eq!(
            function.block(join).predecessors(),
            &BTreeSet::from([left, right])
        );
        assert!(function.block(entry).predecessors().is_empty());
    }
}
