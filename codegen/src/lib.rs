//! Emission of Python source from the IL.
//!
//! The emitter walks the instruction list read-only and prints one statement
//! per instruction. Executing the result in the original runtime rebuilds an
//! object equivalent to the one the stream serializes; the final `stop` value
//! is bound to `result`.

use std::fmt::Write;

use peekle_il::{InsnData, Opcode, Program, Scalar, Value};

#[derive(Debug, Default)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_source(&self, program: &Program) -> String {
        let mut out = String::new();
        for inst in program.iter() {
            let data = program.insn(inst);
            self.write_statement(&mut out, data);
        }
        out
    }

    fn write_statement(&self, out: &mut String, data: &InsnData) {
        if let Some(var) = data.result() {
            let _ = write!(out, "{} = ", var);
        }
        match data.op() {
            Opcode::Stop => {
                let _ = write!(out, "result = {}", expr(data.arg(0)));
            }
            Opcode::Call => {
                let _ = write!(out, "{}", expr(data.arg(0)));
                match data.args().get(1) {
                    Some(Value::Tuple(args)) => {
                        let _ = write!(out, "({})", comma_separated(args));
                    }
                    Some(args) => {
                        let _ = write!(out, "(*{})", expr(args));
                    }
                    None => out.push_str("()"),
                }
            }
            Opcode::Global => match data.args() {
                [module, name] => {
                    let _ = write!(
                        out,
                        "getattr(__import__({}), {})",
                        expr(module),
                        expr(name)
                    );
                }
                [module] => {
                    let _ = write!(out, "__import__({})", expr(module));
                }
                _ => out.push_str("None"),
            },
            Opcode::GetAttr => match identifier(data.arg(1)) {
                Some(name) => {
                    let _ = write!(out, "{}.{}", expr(data.arg(0)), name);
                }
                None => {
                    let _ = write!(out, "getattr({}, {})", expr(data.arg(0)), expr(data.arg(1)));
                }
            },
            Opcode::SetAttr => match identifier(data.arg(1)) {
                Some(name) => {
                    let _ = write!(out, "{}.{} = {}", expr(data.arg(0)), name, expr(data.arg(2)));
                }
                None => {
                    let _ = write!(
                        out,
                        "setattr({}, {}, {})",
                        expr(data.arg(0)),
                        expr(data.arg(1)),
                        expr(data.arg(2))
                    );
                }
            },
            Opcode::GetItem => {
                let _ = write!(out, "{}[{}]", expr(data.arg(0)), expr(data.arg(1)));
            }
            Opcode::SetItem => {
                let _ = write!(
                    out,
                    "{}[{}] = {}",
                    expr(data.arg(0)),
                    expr(data.arg(1)),
                    expr(data.arg(2))
                );
            }
            Opcode::Local => match identifier(data.arg(0)) {
                Some(name) => out.push_str(name),
                None => {
                    let _ = write!(out, "locals()[{}]", expr(data.arg(0)));
                }
            },
            Opcode::MutableConstant => {
                let _ = write!(out, "{}", expr(data.arg(0)));
            }
            Opcode::Build => {
                let _ = write!(out, "{}.__setstate__({})", expr(data.arg(0)), expr(data.arg(1)));
            }
            Opcode::Len => {
                let _ = write!(out, "len({})", expr(data.arg(0)));
            }
            Opcode::Extend => {
                let _ = write!(out, "{}.extend({})", expr(data.arg(0)), expr(data.arg(1)));
            }
            Opcode::Poison => {
                let _ = write!(out, "# lifting failed: {}", expr(data.arg(0)));
            }
            binary => {
                let _ = write!(
                    out,
                    "{} {} {}",
                    expr(data.arg(0)),
                    operator(binary),
                    expr(data.arg(1))
                );
            }
        }
        out.push('\n');
    }
}

/// Values already render as Python literals.
fn expr(value: &Value) -> String {
    value.to_string()
}

fn comma_separated(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The constant string's content, when it can stand as a bare identifier.
fn identifier(value: &Value) -> Option<&str> {
    let Value::Scalar(Scalar::Str(name)) = value else {
        return None;
    };
    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}

fn operator(op: Opcode) -> &'static str {
    match op {
        Opcode::Equals => "==",
        Opcode::NotEquals => "!=",
        Opcode::LessThan => "<",
        Opcode::LessEquals => "<=",
        Opcode::GreaterThan => ">",
        Opcode::GreaterEquals => ">=",
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::FloorDiv => "//",
        Opcode::TrueDiv => "/",
        Opcode::Mod => "%",
        Opcode::Pow => "**",
        Opcode::BitwiseAnd => "&",
        Opcode::BitwiseOr => "|",
        Opcode::BitwiseXor => "^",
        Opcode::Lshift => "<<",
        Opcode::Rshift => ">>",
        other => unreachable!("{other} is not a binary operator"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn emits_assignments_calls_and_stores() {
        let mut program = Program::new();
        let dict = program.append_var(Opcode::MutableConstant, vec![Value::Dict(vec![])]);
        let var = program.result(dict).unwrap();
        program.append(
            Opcode::SetItem,
            vec![Value::Var(var), Value::str("a"), Value::int(1)],
        );
        let call = program.append_var(
            Opcode::Call,
            vec![
                Value::global("collections", Some("OrderedDict")),
                Value::Tuple(vec![Value::Var(var)]),
            ],
        );
        program.append(Opcode::Stop, vec![Value::Var(program.result(call).unwrap())]);

        let source = CodeGenerator::new().generate_source(&program);
        assert_eq!(
            source,
            "v0 = {}\nv0['a'] = 1\nv1 = collections.OrderedDict(v0)\nresult = v1\n"
        );
    }

    #[test]
    fn emits_attribute_sugar_only_for_identifiers() {
        let mut program = Program::new();
        let ok = program.append_var(
            Opcode::GetAttr,
            vec![Value::global("os", None), Value::str("sep")],
        );
        program.append_var(
            Opcode::GetAttr,
            vec![
                Value::Var(program.result(ok).unwrap()),
                Value::str("not an ident"),
            ],
        );

        let source = CodeGenerator::new().generate_source(&program);
        assert_eq!(source, "v0 = os.sep\nv1 = getattr(v0, 'not an ident')\n");
    }

    #[test]
    fn emits_operators_builds_and_poison() {
        let mut program = Program::new();
        let sum = program.append_var(Opcode::Add, vec![Value::int(1), Value::int(2)]);
        let var = program.result(sum).unwrap();
        program.append(
            Opcode::Build,
            vec![Value::Var(var), Value::Tuple(vec![])],
        );
        program.append(Opcode::Poison, vec![Value::str("bad byte")]);

        let source = CodeGenerator::new().generate_source(&program);
        assert_eq!(
            source,
            "v0 = 1 + 2\nv0.__setstate__(())\n# lifting failed: 'bad byte'\n"
        );
    }

    #[test]
    fn emits_local_references_as_bare_names() {
        let mut program = Program::new();
        let local = program.append_var(Opcode::Local, vec![Value::str("flag")]);
        program.append(Opcode::Stop, vec![Value::Var(program.result(local).unwrap())]);
        let source = CodeGenerator::new().generate_source(&program);
        assert_eq!(source, "v0 = flag\nresult = v0\n");
    }
}
