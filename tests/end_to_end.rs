mod common;

use common::*;
use ramc::{
    Type,
    frontend::ast::{
        BinaryOperator, Block, DeclId, DeclarationKind, Expression, ExpressionKind,
        FunctionDefinition, Program, Statement, StatementKind,
    },
    middle::lir::{Function, FunctionBuilder, IrType, Opcode, Predicate, Value},
    optimize_function, resolve,
};

/// Emits LIR for the integer subset of a resolved function: parameters,
/// integer literals, arithmetic, comparisons, returns and if/else where both
/// arms return
fn lower(program: &Program, definition: &FunctionDefinition) -> Function {
    let declaration = program.declaration(definition.declaration);
    let DeclarationKind::Function { parameters } = &declaration.kind else {
        panic!("not a function");
    };
    assert_eq!(declaration.resolved_type, Some(Type::Number));

    let mut function = Function::new(
        &declaration.identifier.to_string(),
        vec![IrType::Int; parameters.len()],
        IrType::Int,
    );
    let mut builder = FunctionBuilder::new(&mut function);
    lower_block(&mut builder, parameters, &definition.body);
    function
}

fn lower_block(builder: &mut FunctionBuilder<'_>, parameters: &[DeclId], block: &Block) {
    for statement in &block.statements {
        match &statement.kind {
            StatementKind::Return(Some(value)) => {
                let value = lower_expression(builder, parameters, value);
                builder.ret(Some(value));
            }
            StatementKind::If {
                condition,
                then_block,
                else_block: Some(else_block),
            } => {
                let condition = lower_expression(builder, parameters, condition);
                let then_target = builder.create_block();
                let else_target = builder.create_block();
                builder.cond_branch(condition, then_target, else_target);

                builder.position_at_end(then_target);
                lower_block(builder, parameters, then_block);
                builder.position_at_end(else_target);
                lower_block(builder, parameters, else_block);
            }
            kind => panic!("unsupported statement {kind:?}"),
        }
    }
}

fn lower_expression(
    builder: &mut FunctionBuilder<'_>,
    parameters: &[DeclId],
    expression: &Expression,
) -> Value {
    assert_eq!(expression.resolved_type, Some(Type::Number));

    match &expression.kind {
        ExpressionKind::NumberLiteral(literal) => {
            Value::int(literal.parse().expect("integer literal"))
        }
        ExpressionKind::Reference(reference) => {
            let declaration = reference.declaration.expect("resolved reference");
            let index = parameters
                .iter()
                .position(|parameter| *parameter == declaration)
                .expect("only parameters are referenced");
            builder.parameter(index as u32)
        }
        ExpressionKind::Binary { lhs, operator, rhs } => {
            let lhs = lower_expression(builder, parameters, lhs);
            let rhs = lower_expression(builder, parameters, rhs);

            match operator {
                BinaryOperator::Add => builder.add(lhs, rhs),
                BinaryOperator::Subtract => builder.sub(lhs, rhs),
                BinaryOperator::Multiply => builder.mul(lhs, rhs),
                BinaryOperator::GreaterThan => builder.compare(Predicate::Gt, lhs, rhs),
                operator => panic!("unsupported operator {operator}"),
            }
        }
        kind => panic!("unsupported expression {kind:?}"),
    }
}

fn binary(lhs: Expression, operator: BinaryOperator, rhs: Expression) -> Expression {
    Expression::binary(loc(1), lhs, operator, rhs)
}

#[test]
fn multiplication_by_four_becomes_a_shift() {
    init_logging();

    // square(n: number): number { return n * 4; }
    let mut program = Program::new();
    function(
        &mut program,
        "square",
        "number",
        &[("n", "number")],
        vec![ret(Some(binary(name("n"), BinaryOperator::Multiply, number("4"))))],
    );

    resolve(&mut program).expect("square is well formed");

    let definition = program.function_named("square").expect("square exists");
    let mut square = lower(&program, definition);
    let unoptimized = square.clone();

    assert!(optimize_function(&mut square));
    square.verify().unwrap();

    let entry = square.entry();
    let shift = square.block(entry).instructions()[0];
    assert_eq!(square.instruction(shift).opcode, Opcode::Shl);
    assert_eq!(
        square.instruction(shift).operands(),
        &[Value::Parameter(0), Value::int(2)]
    );

    for n in [-7, 0, 1, 3, 1 << 20] {
        assert_eq!(evaluate(&square, &[n]), evaluate(&unoptimized, &[n]));
        assert_eq!(evaluate(&square, &[n]), Some(n * 4));
    }
}

#[test]
fn constant_condition_collapses_to_one_block() {
    // pick(n: number): number {
    //     if (1) { return n * 2; } else { return n - 1; }
    // }
    let mut program = Program::new();
    function(
        &mut program,
        "pick",
        "number",
        &[("n", "number")],
        vec![Statement::new(
            loc(2),
            StatementKind::If {
                condition: number("1"),
                then_block: Block::new(
                    loc(2),
                    vec![ret(Some(binary(name("n"), BinaryOperator::Multiply, number("2"))))],
                ),
                else_block: Some(Block::new(
                    loc(2),
                    vec![ret(Some(binary(name("n"), BinaryOperator::Subtract, number("1"))))],
                )),
            },
        )],
    );

    resolve(&mut program).expect("pick is well formed");

    let definition = program.function_named("pick").expect("pick exists");
    let mut pick = lower(&program, definition);
    assert_eq!(pick.layout().len(), 3);

    assert!(optimize_function(&mut pick));
    pick.verify().unwrap();

    // The else arm is unreachable but nothing here removes unreachable blocks
    let entry = pick.entry();
    assert_eq!(pick.layout().len(), 2);
    assert_eq!(
        pick.block(entry)
            .instructions()
            .iter()
            .map(|id| pick.instruction(*id).opcode.clone())
            .collect::<Vec<_>>(),
        vec![Opcode::Shl, Opcode::Return]
    );

    for n in [-2, 0, 9] {
        assert_eq!(evaluate(&pick, &[n]), Some(n * 2));
    }
}

#[test]
fn dynamic_condition_keeps_both_arms() {
    // clamp(n: number): number {
    //     if (n > 8) { return 8; } else { return n * 16; }
    // }
    let mut program = Program::new();
    function(
        &mut program,
        "clamp",
        "number",
        &[("n", "number")],
        vec![Statement::new(
            loc(2),
            StatementKind::If {
                condition: binary(name("n"), BinaryOperator::GreaterThan, number("8")),
                then_block: Block::new(loc(2), vec![ret(Some(number("8")))]),
                else_block: Some(Block::new(
                    loc(2),
                    vec![ret(Some(binary(name("n"), BinaryOperator::Multiply, number("16"))))],
                )),
            },
        )],
    );

    resolve(&mut program).expect("clamp is well formed");

    let definition = program.function_named("clamp").expect("clamp exists");
    let mut clamp = lower(&program, definition);

    assert!(optimize_function(&mut clamp));
    clamp.verify().unwrap();
    assert_eq!(clamp.layout().len(), 3);

    for n in [-1, 8, 9] {
        let expected = if n > 8 { 8 } else { n * 16 };
        assert_eq!(evaluate(&clamp, &[n]), Some(expected));
    }
}

#[test]
fn rejected_programs_never_reach_the_optimizer() {
    let mut program = Program::new();
    function(
        &mut program,
        "broken",
        "number",
        &[("n", "string")],
        vec![ret(Some(binary(name("n"), BinaryOperator::Multiply, number("4"))))],
    );

    let diagnostics = resolve(&mut program).expect_err("strings can not be multiplied");
    assert_eq!(diagnostics.len(), 1);

    let definition = program.function_named("broken").expect("broken exists");
    let StatementKind::Return(Some(value)) = &definition.body.statements[0].kind else {
        panic!("body is a single return");
    };

    // The failed expression was never annotated
    assert_eq!(value.resolved_type, None);
}
