use num_traits::ToPrimitive;

use peekle_il::{Opcode, Program, Scalar, Value};
use peekle_pass::Pass;

use super::eval;

/// Evaluates binary operators whose operands are both scalar constants.
pub struct ConstantValuePass;

impl Pass for ConstantValuePass {
    fn name(&self) -> &str {
        "Constant Value Folding"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.result().is_none() || !data.op().is_binary() || data.args().len() != 2 {
                continue;
            }
            let folded = match (data.arg(0).as_scalar(), data.arg(1).as_scalar()) {
                (Some(a), Some(b)) => eval::fold_binary(data.op(), a, b),
                _ => None,
            };
            let Some(folded) = folded else {
                continue;
            };
            cursor
                .replace_with_value(program, Value::Scalar(folded))
                .expect("the cursor is on an attached instruction");
            modified = true;
        }
        modified
    }
}

/// Folds a `global` instruction over constant module/name strings into a
/// symbolic global constant.
pub struct ConstantGlobalPass;

impl Pass for ConstantGlobalPass {
    fn name(&self) -> &str {
        "Constant Global Folding"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.op() != Opcode::Global || data.result().is_none() {
                continue;
            }
            let module = match data.args().first() {
                Some(Value::Scalar(Scalar::Str(module))) => module.clone(),
                _ => continue,
            };
            let name = match data.args().get(1) {
                None => None,
                Some(Value::Scalar(Scalar::Str(name))) => Some(name.clone()),
                Some(_) => continue,
            };
            cursor
                .replace_with_value(program, Value::Global { module, name })
                .expect("the cursor is on an attached instruction");
            modified = true;
        }
        modified
    }
}

/// Folds `get_item` on a constant container with a constant key into the
/// addressed element.
pub struct ConstantGetItemPass;

/// Index a sequence with the runtime's semantics: negative indices wrap.
fn index_sequence<'a>(values: &'a [Value], key: &Scalar) -> Option<&'a Value> {
    let index = match key {
        Scalar::Bool(b) => *b as isize,
        Scalar::Int(i) => i.to_isize()?,
        _ => return None,
    };
    let index = if index < 0 {
        index.checked_add(values.len() as isize)?
    } else {
        index
    };
    usize::try_from(index).ok().and_then(|i| values.get(i))
}

fn index_dict<'a>(pairs: &'a [(Value, Value)], key: &Scalar) -> Option<&'a Value> {
    pairs.iter().find_map(|(k, v)| match k {
        Value::Scalar(k) if eval::py_eq(k, key) => Some(v),
        _ => None,
    })
}

impl Pass for ConstantGetItemPass {
    fn name(&self) -> &str {
        "Constant Get Item Folding"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.op() != Opcode::GetItem || data.result().is_none() || data.args().len() != 2 {
                continue;
            }
            let Some(key) = data.arg(1).as_scalar() else {
                continue;
            };
            let element = match data.arg(0) {
                Value::Tuple(values) | Value::List(values) => index_sequence(values, key),
                Value::Dict(pairs) => index_dict(pairs, key),
                _ => None,
            };
            let Some(element) = element.cloned() else {
                continue;
            };
            cursor
                .replace_with_value(program, element)
                .expect("the cursor is on an attached instruction");
            modified = true;
        }
        modified
    }
}

/// Inlines a single-use mutable constant as its seed value, provided nothing
/// mutates it: the one use must not be a store or build targeting it.
pub struct InlineMutableConstantPass;

impl Pass for InlineMutableConstantPass {
    fn name(&self) -> &str {
        "Inline Mutable Constants"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.op() != Opcode::MutableConstant {
                continue;
            }
            let Some(var) = data.result() else {
                continue;
            };
            if program.use_count(var) != 1 {
                continue;
            }
            let user = program.uses(var).next().expect("the use set has one entry");
            let user_data = program.insn(user);
            let mutates = matches!(
                user_data.op(),
                Opcode::Build | Opcode::Extend | Opcode::SetItem | Opcode::SetAttr
            ) && user_data.args().first().and_then(Value::as_var) == Some(var);
            if mutates {
                continue;
            }
            let seed = program.insn(inst).arg(0).clone();
            cursor
                .replace_with_value(program, seed)
                .expect("the cursor is on an attached instruction");
            modified = true;
        }
        modified
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(pass: &mut impl Pass, program: &mut Program) -> bool {
        pass.run(program)
    }

    #[test]
    fn folds_binary_scalars_into_uses() {
        let mut program = Program::new();
        let add = program.append_var(Opcode::Add, vec![Value::int(1), Value::int(2)]);
        program.append(Opcode::Stop, vec![Value::Var(program.result(add).unwrap())]);

        assert!(run(&mut ConstantValuePass, &mut program));
        assert_eq!(program.to_string(), "stop 3");
        // fixed point: nothing left to fold
        assert!(!run(&mut ConstantValuePass, &mut program));
    }

    #[test]
    fn leaves_unfoldable_operations_in_place() {
        let mut program = Program::new();
        let div = program.append_var(Opcode::TrueDiv, vec![Value::int(1), Value::int(0)]);
        program.append(Opcode::Stop, vec![Value::Var(program.result(div).unwrap())]);
        assert!(!run(&mut ConstantValuePass, &mut program));
        assert_eq!(program.to_string(), "v0 = true_div 1, 0\nstop v0");
    }

    #[test]
    fn folds_constant_globals() {
        let mut program = Program::new();
        let global = program.append_var(Opcode::Global, vec![Value::str("os"), Value::str("sep")]);
        program.append(Opcode::Stop, vec![Value::Var(program.result(global).unwrap())]);
        assert!(run(&mut ConstantGlobalPass, &mut program));
        assert_eq!(program.to_string(), "stop os.sep");
    }

    #[test]
    fn folds_single_operand_global() {
        let mut program = Program::new();
        let global = program.append_var(Opcode::Global, vec![Value::str("os")]);
        program.append(Opcode::Stop, vec![Value::Var(program.result(global).unwrap())]);
        assert!(run(&mut ConstantGlobalPass, &mut program));
        assert_eq!(program.to_string(), "stop os");
    }

    #[test]
    fn get_item_folding_indexes_tuples_and_dicts() {
        let mut program = Program::new();
        let item = program.append_var(
            Opcode::GetItem,
            vec![
                Value::Tuple(vec![Value::str("a"), Value::str("b")]),
                Value::int(-1),
            ],
        );
        program.append(Opcode::Stop, vec![Value::Var(program.result(item).unwrap())]);
        assert!(run(&mut ConstantGetItemPass, &mut program));
        assert_eq!(program.to_string(), "stop 'b'");

        let mut program = Program::new();
        let item = program.append_var(
            Opcode::GetItem,
            vec![
                Value::Dict(vec![
                    (Value::str("x"), Value::int(1)),
                    (Value::int(2), Value::int(3)),
                ]),
                Value::scalar(2.0),
            ],
        );
        program.append(Opcode::Stop, vec![Value::Var(program.result(item).unwrap())]);
        assert!(run(&mut ConstantGetItemPass, &mut program));
        assert_eq!(program.to_string(), "stop 3");
    }

    #[test]
    fn get_item_folding_skips_missing_keys() {
        let mut program = Program::new();
        let item = program.append_var(
            Opcode::GetItem,
            vec![Value::Tuple(vec![Value::int(1)]), Value::int(5)],
        );
        program.append(Opcode::Stop, vec![Value::Var(program.result(item).unwrap())]);
        assert!(!run(&mut ConstantGetItemPass, &mut program));
    }

    #[test]
    fn inlines_single_use_mutable_constants() {
        let mut program = Program::new();
        let dict = program.append_var(
            Opcode::MutableConstant,
            vec![Value::Dict(vec![(Value::str("a"), Value::int(1))])],
        );
        program.append(Opcode::Stop, vec![Value::Var(program.result(dict).unwrap())]);
        assert!(run(&mut InlineMutableConstantPass, &mut program));
        assert_eq!(program.to_string(), "stop {'a': 1}");
    }

    #[test]
    fn does_not_inline_mutated_or_shared_constants() {
        // the sole use is a store targeting the constant
        let mut program = Program::new();
        let list = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let var = program.result(list).unwrap();
        program.append(
            Opcode::Extend,
            vec![Value::Var(var), Value::List(vec![Value::int(1)])],
        );
        assert!(!run(&mut InlineMutableConstantPass, &mut program));

        // two uses
        let mut program = Program::new();
        let list = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let var = program.result(list).unwrap();
        program.append(
            Opcode::Extend,
            vec![Value::Var(var), Value::List(vec![Value::int(1)])],
        );
        program.append(Opcode::Stop, vec![Value::Var(var)]);
        assert!(!run(&mut InlineMutableConstantPass, &mut program));
    }

    #[test]
    fn inlines_when_the_single_use_reads_but_does_not_mutate() {
        // the constant appears in the extended value, not as the target
        let mut program = Program::new();
        let target = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let target_var = program.result(target).unwrap();
        let inner = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let inner_var = program.result(inner).unwrap();
        program.append(
            Opcode::Extend,
            vec![
                Value::Var(target_var),
                Value::List(vec![Value::Var(inner_var)]),
            ],
        );
        program.append(Opcode::Stop, vec![Value::Var(target_var)]);

        assert!(run(&mut InlineMutableConstantPass, &mut program));
        assert_eq!(
            program.to_string(),
            "v0 = mutable_constant []\nextend v0, [[]]\nstop v0"
        );
    }
}
