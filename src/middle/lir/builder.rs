use super::{BlockId, Function, InstId, IrType, Opcode, Predicate, Value};
use crate::frontend::intern::InternedSymbol;

/// Appends instructions to the end of a block of a [`Function`]. This is the
/// interface code generation uses to produce LIR.
#[derive(Debug)]
pub struct FunctionBuilder<'f> {
    function: &'f mut Function,
    block: BlockId,
}

impl<'f> FunctionBuilder<'f> {
    /// Starts building at the end of the entry block
    pub fn new(function: &'f mut Function) -> Self {
        let block = function.entry();

        Self { function, block }
    }

    pub fn function(&self) -> &Function {
        self.function
    }

    pub fn create_block(&mut self) -> BlockId {
        self.function.create_block()
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.block
    }

    pub fn parameter(&self, index: u32) -> Value {
        assert!(
            (index as usize) < self.function.parameters.len(),
            "function `{}` has no parameter {index}",
            self.function.name
        );

        Value::Parameter(index)
    }

    fn emit(&mut self, opcode: Opcode, ty: IrType, operands: Vec<Value>) -> InstId {
        self.function
            .append_instruction(self.block, opcode, ty, operands)
    }

    fn binary(&mut self, opcode: Opcode, lhs: Value, rhs: Value) -> Value {
        let ty = self.function.value_type(lhs);

        Value::Instruction(self.emit(opcode, ty, vec![lhs, rhs]))
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::Mul, lhs, rhs)
    }

    pub fn sdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::SDiv, lhs, rhs)
    }

    pub fn srem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::SRem, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::Shl, lhs, rhs)
    }

    pub fn fadd(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::FAdd, lhs, rhs)
    }

    pub fn fsub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::FSub, lhs, rhs)
    }

    pub fn fmul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::FMul, lhs, rhs)
    }

    pub fn fdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::FDiv, lhs, rhs)
    }

    pub fn frem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(Opcode::FRem, lhs, rhs)
    }

    pub fn compare(&mut self, predicate: Predicate, lhs: Value, rhs: Value) -> Value {
        Value::Instruction(self.emit(
            Opcode::Compare(predicate),
            IrType::Bool,
            vec![lhs, rhs],
        ))
    }

    pub fn alloca(&mut self, ty: IrType) -> Value {
        Value::Instruction(self.emit(Opcode::Alloca(ty), IrType::Ptr, Vec::new()))
    }

    pub fn load(&mut self, pointer: Value, ty: IrType) -> Value {
        Value::Instruction(self.emit(Opcode::Load, ty, vec![pointer]))
    }

    pub fn store(&mut self, value: Value, pointer: Value) -> InstId {
        self.emit(Opcode::Store, IrType::Void, vec![value, pointer])
    }

    pub fn call(&mut self, callee: &str, arguments: Vec<Value>, ty: IrType) -> Value {
        Value::Instruction(self.emit(
            Opcode::Call(InternedSymbol::new(callee)),
            ty,
            arguments,
        ))
    }

    pub fn print(&mut self, arguments: Vec<Value>) -> InstId {
        self.emit(Opcode::Print, IrType::Void, arguments)
    }

    /// Phi nodes must be emitted before any other instruction of the block
    pub fn phi(&mut self, ty: IrType, incoming: &[(Value, BlockId)]) -> Value {
        debug_assert_eq!(
            self.function.phis(self.block).len(),
            self.function.block(self.block).instructions().len(),
            "phi nodes must lead their block"
        );

        let (operands, blocks): (Vec<Value>, Vec<BlockId>) = incoming.iter().copied().unzip();

        Value::Instruction(self.emit(Opcode::Phi { incoming: blocks }, ty, operands))
    }

    pub fn branch(&mut self, target: BlockId) -> InstId {
        self.emit(Opcode::Branch { target }, IrType::Void, Vec::new())
    }

    pub fn cond_branch(
        &mut self,
        condition: Value,
        then_block: BlockId,
        else_block: BlockId,
    ) -> InstId {
        self.emit(
            Opcode::CondBranch {
                then_block,
                else_block,
            },
            IrType::Void,
            vec![condition],
        )
    }

    pub fn ret(&mut self, value: Option<Value>) -> InstId {
        self.emit(Opcode::Return, IrType::Void, value.into_iter().collect())
    }
}
