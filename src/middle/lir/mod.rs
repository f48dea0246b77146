//! LIR (Low-level Intermediate Representation). A function is a graph of
//! basic blocks, each holding a list of instructions that ends in exactly one
//! terminator. Instructions track who uses them so the optimizer can rewrite
//! the graph in place without leaving dangling edges.
//!
//! Every mutation that touches an operand goes through [`Function`], which
//! updates the use-list of the operand and the operand list of the user in the
//! same step. Predecessor sets are kept in sync with terminators the same way.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::{
    frontend::intern::InternedSymbol,
    index::{IndexVec, simple_index},
};

pub mod builder;
pub mod verify;

pub use builder::FunctionBuilder;
pub use verify::VerifyError;

simple_index! {
    /// Identifies an LIR block
    pub struct BlockId;
}

simple_index! {
    /// Identifies an LIR instruction (and the value it produces)
    pub struct InstId;
}

#[derive(Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IrType {
    Bool,
    Int,
    Float,
    Str,
    Ptr,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(InternedSymbol),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Int(_) => IrType::Int,
            Constant::Float(_) => IrType::Float,
            Constant::Bool(_) => IrType::Bool,
            Constant::Str(_) => IrType::Str,
        }
    }

    /// Whether a branch on this constant takes its first successor
    pub fn is_truthy(&self) -> bool {
        match *self {
            Constant::Int(value) => value != 0,
            Constant::Float(value) => value != 0.0,
            Constant::Bool(value) => value,
            Constant::Str(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Constant(Constant),
    /// The n-th argument of the enclosing function
    Parameter(u32),
    Instruction(InstId),
}

impl Value {
    pub fn int(value: i64) -> Self {
        Self::Constant(Constant::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::Constant(Constant::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::Constant(Constant::Bool(value))
    }

    pub fn as_instruction(&self) -> Option<InstId> {
        match self {
            Value::Instruction(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<Constant> {
        match self {
            Value::Constant(constant) => Some(*constant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    Shl,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    Compare(Predicate),
    /// Reserves a stack slot holding a value of the given type
    Alloca(IrType),
    /// `load ptr`
    Load,
    /// `store value, ptr`
    Store,
    Call(InternedSymbol),
    Print,
    /// One operand per entry in `incoming`, in the same order
    Phi { incoming: Vec<BlockId> },
    Branch { target: BlockId },
    /// `condbr condition`
    CondBranch {
        then_block: BlockId,
        else_block: BlockId,
    },
    /// `ret [value]`
    Return,
}

impl Opcode {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Branch { .. } | Opcode::CondBranch { .. } | Opcode::Return
        )
    }

    /// Instructions that may never be removed just because nothing uses their
    /// result
    pub fn has_side_effects(&self) -> bool {
        self.is_terminator() || matches!(self, Opcode::Store | Opcode::Call(_) | Opcode::Print)
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Opcode::Branch { target } => vec![*target],
            Opcode::CondBranch {
                then_block,
                else_block,
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Type of the produced value, `Void` when nothing is produced
    pub ty: IrType,
    operands: Vec<Value>,
    /// One entry per operand slot (anywhere in the function) that refers to
    /// this instruction
    users: Vec<InstId>,
    block: BlockId,
}

impl Instruction {
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn users(&self) -> &[InstId] {
        &self.users
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// No side effects and no remaining users
    pub fn is_trivially_dead(&self) -> bool {
        !self.opcode.has_side_effects() && self.users.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    instructions: Vec<InstId>,
    predecessors: BTreeSet<BlockId>,
}

impl BasicBlock {
    pub fn instructions(&self) -> &[InstId] {
        &self.instructions
    }

    pub fn predecessors(&self) -> &BTreeSet<BlockId> {
        &self.predecessors
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: InternedSymbol,
    pub parameters: Vec<IrType>,
    pub return_type: IrType,
    entry: BlockId,
    /// Live blocks in textual order
    layout: Vec<BlockId>,
    blocks: IndexVec<BlockId, Option<BasicBlock>>,
    instructions: IndexVec<InstId, Option<Instruction>>,
}

impl Function {
    /// Creates a function holding a single, empty entry block
    pub fn new(name: &str, parameters: Vec<IrType>, return_type: IrType) -> Self {
        let mut function = Self {
            name: InternedSymbol::new(name),
            parameters,
            return_type,
            entry: BlockId(0),
            layout: Vec::new(),
            blocks: IndexVec::new(),
            instructions: IndexVec::new(),
        };

        function.entry = function.create_block();
        function
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Snapshot of the block order, safe to hold across block removal
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.layout.clone()
    }

    pub fn contains_block(&self, block: BlockId) -> bool {
        self.blocks.get(block).is_some_and(Option::is_some)
    }

    pub fn block(&self, block: BlockId) -> &BasicBlock {
        self.blocks[block]
            .as_ref()
            .unwrap_or_else(|| panic!("block {block} was removed"))
    }

    fn block_mut(&mut self, block: BlockId) -> &mut BasicBlock {
        self.blocks[block]
            .as_mut()
            .unwrap_or_else(|| panic!("block {block} was removed"))
    }

    pub fn is_live(&self, instruction: InstId) -> bool {
        self.instructions
            .get(instruction)
            .is_some_and(Option::is_some)
    }

    pub fn instruction(&self, instruction: InstId) -> &Instruction {
        self.instructions[instruction]
            .as_ref()
            .unwrap_or_else(|| panic!("instruction {instruction} was erased"))
    }

    fn instruction_mut(&mut self, instruction: InstId) -> &mut Instruction {
        self.instructions[instruction]
            .as_mut()
            .unwrap_or_else(|| panic!("instruction {instruction} was erased"))
    }

    /// Every live instruction in program order
    pub fn instruction_ids(&self) -> Vec<InstId> {
        self.layout
            .iter()
            .flat_map(|block| self.block(*block).instructions.iter().copied())
            .collect()
    }

    pub fn instruction_count(&self) -> usize {
        self.layout
            .iter()
            .map(|block| self.block(*block).instructions.len())
            .sum()
    }

    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.block(block)
            .instructions
            .last()
            .copied()
            .filter(|instruction| self.instruction(*instruction).is_terminator())
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(|terminator| self.instruction(terminator).opcode.successors())
            .unwrap_or_default()
    }

    /// The phi nodes at the top of a block
    pub fn phis(&self, block: BlockId) -> Vec<InstId> {
        self.block(block)
            .instructions
            .iter()
            .copied()
            .take_while(|instruction| {
                matches!(self.instruction(*instruction).opcode, Opcode::Phi { .. })
            })
            .collect()
    }

    pub fn value_type(&self, value: Value) -> IrType {
        match value {
            Value::Constant(constant) => constant.ty(),
            Value::Parameter(index) => self.parameters[index as usize],
            Value::Instruction(instruction) => self.instruction(instruction).ty,
        }
    }

    /* Mutation */

    pub fn create_block(&mut self) -> BlockId {
        let block = self.blocks.push(Some(BasicBlock::default()));
        self.layout.push(block);
        block
    }

    /// Appends an instruction to the end of a block, wiring up use-lists and,
    /// for terminators, the predecessor sets of the successors
    pub fn append_instruction(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        ty: IrType,
        operands: Vec<Value>,
    ) -> InstId {
        assert!(
            self.terminator(block).is_none(),
            "block {block} is already terminated"
        );

        let instruction = self.instructions.push(None);

        for operand in &operands {
            self.add_use(*operand, instruction);
        }

        if opcode.is_terminator() {
            self.link_successors(block, &opcode);
        }

        self.instructions[instruction] = Some(Instruction {
            opcode,
            ty,
            operands,
            users: Vec::new(),
            block,
        });
        self.block_mut(block).instructions.push(instruction);

        instruction
    }

    /// Rewrites an instruction in place, keeping its identity (and therefore
    /// every existing use of its result)
    pub fn replace_instruction(
        &mut self,
        instruction: InstId,
        opcode: Opcode,
        ty: IrType,
        operands: Vec<Value>,
    ) {
        let block = self.instruction(instruction).block;
        let old_opcode = self.instruction(instruction).opcode.clone();

        assert_eq!(
            old_opcode.is_terminator(),
            opcode.is_terminator(),
            "terminators can only be replaced by terminators"
        );

        let old_operands = std::mem::take(&mut self.instruction_mut(instruction).operands);
        for operand in old_operands {
            self.remove_use(operand, instruction);
        }

        if old_opcode.is_terminator() {
            self.unlink_successors(block, &old_opcode);
            self.link_successors(block, &opcode);
        }

        for operand in &operands {
            self.add_use(*operand, instruction);
        }

        let inst = self.instruction_mut(instruction);
        inst.opcode = opcode;
        inst.ty = ty;
        inst.operands = operands;
    }

    pub fn set_operand(&mut self, instruction: InstId, index: usize, value: Value) {
        let old = std::mem::replace(
            &mut self.instruction_mut(instruction).operands[index],
            value,
        );

        self.remove_use(old, instruction);
        self.add_use(value, instruction);
    }

    /// Redirects every use of `instruction` to `value`
    pub fn replace_all_uses_with(&mut self, instruction: InstId, value: Value) {
        if value == Value::Instruction(instruction) {
            return;
        }

        let users = std::mem::take(&mut self.instruction_mut(instruction).users);

        for user in users.into_iter().unique() {
            let slots = self
                .instruction(user)
                .operands
                .iter()
                .positions(|operand| *operand == Value::Instruction(instruction))
                .collect::<Vec<_>>();

            for slot in slots {
                self.instruction_mut(user).operands[slot] = value;
                self.add_use(value, user);
            }
        }
    }

    /// Removes an unused instruction from its block and from the use-lists of
    /// its operands
    pub fn erase_instruction(&mut self, instruction: InstId) {
        let erased = self.instructions[instruction]
            .take()
            .unwrap_or_else(|| panic!("instruction {instruction} was already erased"));

        assert!(
            erased.users.is_empty(),
            "erased instruction {instruction} which is still used by {:?}",
            erased.users
        );

        for operand in &erased.operands {
            self.remove_use(*operand, instruction);
        }

        if erased.opcode.is_terminator() {
            self.unlink_successors(erased.block, &erased.opcode);
        }

        self.block_mut(erased.block)
            .instructions
            .retain(|i| *i != instruction);
    }

    /// Drops the entry for `predecessor` from a phi node
    pub fn remove_phi_incoming(&mut self, phi: InstId, predecessor: BlockId) {
        let Opcode::Phi { incoming } = &self.instruction(phi).opcode else {
            panic!("instruction {phi} is not a phi");
        };

        let Some(slot) = incoming.iter().position(|block| *block == predecessor) else {
            return;
        };

        let inst = self.instruction_mut(phi);
        let Opcode::Phi { incoming } = &mut inst.opcode else {
            unreachable!()
        };
        incoming.remove(slot);
        let operand = inst.operands.remove(slot);

        self.remove_use(operand, phi);
    }

    /// Moves every instruction of `from` to the end of `into` and deletes
    /// `from`. Successors of `from` become successors of `into`.
    pub fn splice_block(&mut self, into: BlockId, from: BlockId) {
        assert_ne!(from, self.entry, "the entry block can not be spliced away");
        assert_ne!(from, into, "a block can not be spliced into itself");
        assert!(
            self.terminator(into).is_none(),
            "block {into} must not be terminated before splicing"
        );

        let removed = self.blocks[from]
            .take()
            .unwrap_or_else(|| panic!("block {from} was removed"));
        self.layout.retain(|block| *block != from);

        for instruction in &removed.instructions {
            self.instruction_mut(*instruction).block = into;
        }

        self.block_mut(into)
            .instructions
            .extend(removed.instructions);

        for successor in self.successors(into) {
            let block = self.block_mut(successor);
            block.predecessors.remove(&from);
            block.predecessors.insert(into);

            for phi in self.phis(successor) {
                let Opcode::Phi { incoming } = &mut self.instruction_mut(phi).opcode else {
                    unreachable!()
                };

                for block in incoming.iter_mut().filter(|block| **block == from) {
                    *block = into;
                }
            }
        }

        // Any other predecessors of `from` now point at a block that no longer
        // exists, which only happens if the caller broke the CFG
        debug_assert!(
            removed
                .predecessors
                .iter()
                .all(|predecessor| !self.contains_block(*predecessor)
                    || !self.successors(*predecessor).contains(&from)),
            "spliced block {from} still has live predecessors"
        );
    }

    fn add_use(&mut self, value: Value, user: InstId) {
        if let Value::Instruction(definition) = value {
            self.instruction_mut(definition).users.push(user);
        }
    }

    fn remove_use(&mut self, value: Value, user: InstId) {
        let Value::Instruction(definition) = value else {
            return;
        };

        // The definition may be the (already taken) user itself
        let Some(definition) = self.instructions[definition].as_mut() else {
            return;
        };

        if let Some(position) = definition.users.iter().position(|u| *u == user) {
            definition.users.swap_remove(position);
        }
    }

    fn link_successors(&mut self, block: BlockId, opcode: &Opcode) {
        for successor in opcode.successors() {
            self.block_mut(successor).predecessors.insert(block);
        }
    }

    fn unlink_successors(&mut self, block: BlockId, opcode: &Opcode) {
        for successor in opcode.successors() {
            if let Some(Some(successor)) = self.blocks.get_mut(successor) {
                successor.predecessors.remove(&block);
            }
        }
    }
}
