#![allow(dead_code)]

use hashbrown::HashMap;
use ramc::{
    frontend::{
        SourceLocation,
        ast::{Block, DeclId, Expression, ExpressionKind, Program, Statement, StatementKind},
    },
    middle::lir::{BlockId, Constant, Function, InstId, Opcode, Predicate, Value},
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("test.ram", line, 1)
}

/// Declares a function with its parameters in one go
pub fn function(
    program: &mut Program,
    name: &str,
    return_type: &str,
    parameters: &[(&str, &str)],
    statements: Vec<Statement>,
) -> DeclId {
    let parameters = parameters
        .iter()
        .map(|(identifier, ty)| program.declare_parameter(loc(1), identifier, ty))
        .collect();

    program.declare_function(
        loc(1),
        name,
        return_type,
        parameters,
        Block::new(loc(1), statements),
    )
}

pub fn variable(
    program: &mut Program,
    line: u32,
    name: &str,
    ty: &str,
    initializer: Option<Expression>,
) -> Statement {
    let declaration = program.declare_variable(loc(line), name, ty);

    Statement::variable(loc(line), declaration, initializer)
}

pub fn number(value: &str) -> Expression {
    Expression::number(loc(1), value)
}

pub fn string(value: &str) -> Expression {
    Expression::string(loc(1), value)
}

pub fn name(identifier: &str) -> Expression {
    Expression::reference(loc(1), identifier)
}

pub fn ret(value: Option<Expression>) -> Statement {
    Statement::ret(loc(1), value)
}

pub fn expr(expression: Expression) -> Statement {
    Statement::expression(expression)
}

/// Calls `f` for every expression reachable from the statements, outermost
/// first
pub fn for_each_expression(statements: &[Statement], f: &mut impl FnMut(&Expression)) {
    fn visit(expression: &Expression, f: &mut impl FnMut(&Expression)) {
        f(expression);

        match &expression.kind {
            ExpressionKind::Call { arguments, .. } | ExpressionKind::Print { arguments } => {
                for argument in arguments {
                    visit(argument, f);
                }
            }
            ExpressionKind::Binary { lhs, rhs, .. } => {
                visit(lhs, f);
                visit(rhs, f);
            }
            ExpressionKind::Assignment { value, .. } => visit(value, f),
            _ => {}
        }
    }

    for statement in statements {
        match &statement.kind {
            StatementKind::Expression(expression) => visit(expression, f),
            StatementKind::VariableDeclaration {
                initializer: Some(expression),
                ..
            }
            | StatementKind::Return(Some(expression)) => visit(expression, f),
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                visit(condition, f);
                for_each_expression(&then_block.statements, f);
                if let Some(else_block) = else_block {
                    for_each_expression(&else_block.statements, f);
                }
            }
            StatementKind::While { condition, body } => {
                visit(condition, f);
                for_each_expression(&body.statements, f);
            }
            StatementKind::Block(block) => for_each_expression(&block.statements, f),
            _ => {}
        }
    }
}

/// Interprets integer LIR. Only meant for checking that optimized functions
/// still compute the same thing.
pub fn evaluate(function: &Function, arguments: &[i64]) -> Option<i64> {
    let mut values: HashMap<InstId, i64> = HashMap::new();
    let mut block = function.entry();
    let mut previous: Option<BlockId> = None;

    let read = |values: &HashMap<InstId, i64>, value: Value| match value {
        Value::Constant(Constant::Int(value)) => value,
        Value::Constant(Constant::Bool(value)) => value as i64,
        Value::Constant(constant) => panic!("unsupported constant {constant:?}"),
        Value::Parameter(index) => arguments[index as usize],
        Value::Instruction(id) => values[&id],
    };

    for _ in 0..10_000 {
        let mut next = None;
        // Phis of a block all read the values live on the incoming edge, so
        // they are committed together once the first non-phi is reached
        let mut phis = Vec::new();

        for &id in function.block(block).instructions() {
            let instruction = function.instruction(id);

            if let Opcode::Phi { incoming } = &instruction.opcode {
                let from = previous.expect("phi in the entry block");
                let slot = incoming
                    .iter()
                    .position(|block| *block == from)
                    .expect("phi has an entry for every predecessor");

                phis.push((id, read(&values, instruction.operands()[slot])));
                continue;
            }

            values.extend(phis.drain(..));

            let operands = instruction
                .operands()
                .iter()
                .map(|operand| read(&values, *operand))
                .collect::<Vec<_>>();

            let result = match &instruction.opcode {
                Opcode::Add => operands[0].wrapping_add(operands[1]),
                Opcode::Sub => operands[0].wrapping_sub(operands[1]),
                Opcode::Mul => operands[0].wrapping_mul(operands[1]),
                Opcode::SDiv => operands[0] / operands[1],
                Opcode::SRem => operands[0] % operands[1],
                Opcode::Shl => operands[0].wrapping_shl(operands[1] as u32),
                Opcode::Compare(predicate) => {
                    let (lhs, rhs) = (operands[0], operands[1]);
                    let holds = match predicate {
                        Predicate::Eq => lhs == rhs,
                        Predicate::Ne => lhs != rhs,
                        Predicate::Lt => lhs < rhs,
                        Predicate::Le => lhs <= rhs,
                        Predicate::Gt => lhs > rhs,
                        Predicate::Ge => lhs >= rhs,
                    };
                    holds as i64
                }
                Opcode::Branch { target } => {
                    next = Some(*target);
                    0
                }
                Opcode::CondBranch {
                    then_block,
                    else_block,
                } => {
                    next = Some(if operands[0] != 0 {
                        *then_block
                    } else {
                        *else_block
                    });
                    0
                }
                Opcode::Return => return operands.first().copied(),
                opcode => panic!("unsupported opcode {opcode:?}"),
            };

            values.insert(id, result);
        }

        previous = Some(block);
        block = next.expect("block ended without a terminator");
    }

    panic!("evaluation did not terminate")
}
