//! Pipeline-level properties: the full pass set reaches a fixed point, a
//! second run changes nothing, and a pass that reports no modification has
//! left the program textually identical.

use peekle_analysis::{validation::validate, Analyzer, StaticOracle};
use peekle_il::{Opcode, Program, Value};
use peekle_pass::{Pass, PassManager};
use peekle_transform::{default_pipeline, ConstantValuePass, GlobalReductionPass};
use pretty_assertions::assert_eq;

/// A lifted-shape program exercising most passes: an import, an attribute
/// chain, a dunder call and a mutable container.
fn sample_program() -> Program {
    let mut program = Program::new();
    // v0 = call builtins.__import__, ('os')
    let import = program.append_var(
        Opcode::Call,
        vec![
            Value::global("builtins", Some("__import__")),
            Value::Tuple(vec![Value::str("os")]),
        ],
    );
    // v1 = call builtins.getattr, (v0, 'path')
    let path = program.append_var(
        Opcode::Call,
        vec![
            Value::global("builtins", Some("getattr")),
            Value::Tuple(vec![
                Value::Var(program.result(import).unwrap()),
                Value::str("path"),
            ]),
        ],
    );
    // v2 = call builtins.int.__add__, (1, 2)
    let sum = program.append_var(
        Opcode::Call,
        vec![
            Value::global("builtins", Some("int.__add__")),
            Value::Tuple(vec![Value::int(1), Value::int(2)]),
        ],
    );
    // v3 = mutable_constant [] ; extend v3, [v1, v2]
    let list = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
    let list_var = program.result(list).unwrap();
    program.append(
        Opcode::Extend,
        vec![
            Value::Var(list_var),
            Value::List(vec![
                Value::Var(program.result(path).unwrap()),
                Value::Var(program.result(sum).unwrap()),
            ]),
        ],
    );
    program.append(Opcode::Stop, vec![Value::Var(list_var)]);
    program
}

#[test]
fn pipeline_simplifies_and_is_idempotent() {
    let oracle = StaticOracle;
    let analyzer = Analyzer::new(&oracle);
    let mut program = sample_program();

    let mut manager = default_pipeline(&analyzer);
    let iterations = manager.run(&mut program, PassManager::DEFAULT_MAX_PASSES);
    assert!(iterations >= 2);
    validate(&program).unwrap();

    assert_eq!(
        program.to_string(),
        "v3 = mutable_constant []\nextend v3, [os.path, 3]\nstop v3"
    );

    // A second full run observes the fixed point immediately.
    let after_first = program.to_string();
    let mut manager = default_pipeline(&analyzer);
    assert_eq!(manager.run(&mut program, PassManager::DEFAULT_MAX_PASSES), 1);
    assert_eq!(program.to_string(), after_first);
    validate(&program).unwrap();
}

#[test]
fn unmodifying_passes_leave_the_program_byte_identical() {
    let mut program = Program::new();
    program.append(Opcode::Stop, vec![Value::str("nothing to fold")]);
    let before = program.to_string();

    assert!(!ConstantValuePass.run(&mut program));
    assert_eq!(program.to_string(), before);
    assert!(!GlobalReductionPass.run(&mut program));
    assert_eq!(program.to_string(), before);
    validate(&program).unwrap();
}

#[test]
fn poison_is_inert_under_the_pipeline() {
    let oracle = StaticOracle;
    let analyzer = Analyzer::new(&oracle);
    let mut program = Program::new();
    let add = program.append_var(Opcode::Add, vec![Value::int(1), Value::int(2)]);
    program.append(Opcode::Stop, vec![Value::Var(program.result(add).unwrap())]);
    program.append(Opcode::Poison, vec![Value::str("stack underflow at 12")]);
    program.poison = true;

    let mut manager = default_pipeline(&analyzer);
    manager.run(&mut program, PassManager::DEFAULT_MAX_PASSES);
    assert_eq!(
        program.to_string(),
        "stop 3\npoison 'stack underflow at 12'"
    );
    assert!(program.poison);
}
