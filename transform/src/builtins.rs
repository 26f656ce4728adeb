//! Passes that recognize calls into the host's standard library and rewrite
//! them as first-class IL operations.

use peekle_analysis::{dunder_op, Analyzer, WellKnown};
use peekle_il::{Inst, InsnCursor, Opcode, Program, Scalar, Value};
use peekle_pass::Pass;

/// Rewrites calls of recognized structural callables (`getattr`, `setattr`,
/// and the bound dunders of the primitive classes) into the operations they
/// implement.
pub struct GlobalCallPass<'a> {
    analyzer: &'a Analyzer<'a>,
}

impl<'a> GlobalCallPass<'a> {
    pub fn new(analyzer: &'a Analyzer<'a>) -> Self {
        Self { analyzer }
    }
}

impl Pass for GlobalCallPass<'_> {
    fn name(&self) -> &str {
        "Global Call Simplification"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            let Some(callee) = self.analyzer.constant_callee(data) else {
                continue;
            };
            let Some((op, nargs)) = self.analyzer.global_call(callee) else {
                continue;
            };
            let args = match data.arg(1) {
                Value::Tuple(values) if values.len() == nargs => values.clone(),
                _ => continue,
            };
            let replacement = program.create_var_insn(op, args);
            cursor
                .replace(program, replacement)
                .expect("a fresh definition may replace the call");
            modified = true;
        }
        modified
    }
}

/// Rewrites `call(get_attr(recv, '__dunder__'), (args…))` into the structural
/// operation named by the dunder, with the receiver as the leading operand.
/// The attribute load is dropped once every eligible call is rewritten.
pub struct InstanceDunderPass;

impl Pass for InstanceDunderPass {
    fn name(&self) -> &str {
        "Instance Dunder Simplification"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.op() != Opcode::GetAttr || data.args().len() != 2 {
                continue;
            }
            let Some(var) = data.result() else {
                continue;
            };
            let mapped = match data.arg(1) {
                Value::Scalar(Scalar::Str(name)) => dunder_op(name),
                _ => None,
            };
            let Some((op, nargs)) = mapped else {
                continue;
            };
            let receiver = data.arg(0).clone();

            let users: Vec<Inst> = program.uses(var).collect();
            let mut replaceable = vec![];
            for user in users {
                let call = program.insn(user);
                if call.op() != Opcode::Call || call.args().first().and_then(Value::as_var) != Some(var)
                {
                    continue;
                }
                match call.args().get(1) {
                    Some(Value::Tuple(values)) if values.len() == nargs => replaceable.push(user),
                    _ => (),
                }
            }

            for user in replaceable {
                let call_args = match program.insn(user).arg(1) {
                    Value::Tuple(values) => values.clone(),
                    _ => unreachable!("checked when collecting"),
                };
                let mut args = Vec::with_capacity(call_args.len() + 1);
                args.push(receiver.clone());
                args.extend(call_args);
                let replacement = program.create_var_insn(op, args);
                program
                    .replace(user, replacement)
                    .expect("a fresh definition may replace the call");
                modified = true;
            }

            if !program.has_uses(inst) {
                cursor
                    .remove(program)
                    .expect("the attribute load has no remaining uses");
                modified = true;
            }
        }
        modified
    }
}

/// Rewrites `__import__(module)` as a symbolic global (for a constant module
/// name) or a `global` instruction (for a computed one).
pub struct ImportToGlobalPass<'a> {
    analyzer: &'a Analyzer<'a>,
}

impl<'a> ImportToGlobalPass<'a> {
    pub fn new(analyzer: &'a Analyzer<'a>) -> Self {
        Self { analyzer }
    }
}

impl Pass for ImportToGlobalPass<'_> {
    fn name(&self) -> &str {
        "Import to Global Simplification"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if data.result().is_none() {
                continue;
            }
            if self.analyzer.constant_callee(data) != Some(WellKnown::Import) {
                continue;
            }
            let module = match data.arg(1) {
                Value::Tuple(values) => values.first().cloned(),
                _ => None,
            };
            let Some(module) = module else {
                continue;
            };
            match module {
                Value::Scalar(Scalar::Str(module)) => {
                    cursor
                        .replace_with_value(program, Value::Global { module, name: None })
                        .expect("the cursor is on an attached instruction");
                }
                module => {
                    let replacement = program.create_var_insn(Opcode::Global, vec![module]);
                    cursor
                        .replace(program, replacement)
                        .expect("a fresh definition may replace the call");
                }
            }
            modified = true;
        }
        modified
    }
}

/// Collapses attribute chains rooted at a symbolic global into a single
/// global with a dotted member path, recursively: reducing one link can make
/// its users reducible in turn.
pub struct GlobalReductionPass;

impl GlobalReductionPass {
    fn reduce(
        &self,
        program: &mut Program,
        cursor: Option<&mut InsnCursor>,
        inst: Inst,
    ) -> bool {
        if !program.is_attached(inst) {
            return false;
        }
        let data = program.insn(inst);
        if data.op() != Opcode::GetAttr || data.result().is_none() || data.args().len() != 2 {
            return false;
        }
        let (module, prefix) = match data.arg(0) {
            Value::Global { module, name } => (module.clone(), name.clone()),
            _ => return false,
        };
        let attr = match data.arg(1) {
            Value::Scalar(Scalar::Str(attr)) => attr.clone(),
            _ => return false,
        };
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, attr),
            None => attr,
        };

        let var = data.result().expect("checked above");
        // Snapshot before the replacement rewires the use sets.
        let users: Vec<Inst> = program.uses(var).collect();
        let reduced = Value::Global {
            module,
            name: Some(name),
        };
        match cursor {
            Some(cursor) => cursor
                .replace_with_value(program, reduced)
                .expect("the cursor is on an attached instruction"),
            None => program
                .replace_with_value(inst, reduced)
                .expect("a reducible instruction is attached"),
        }

        for user in users {
            self.reduce(program, None, user);
        }
        true
    }
}

impl Pass for GlobalReductionPass {
    fn name(&self) -> &str {
        "Global Reduction"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            modified |= self.reduce(program, Some(&mut cursor), inst);
        }
        modified
    }
}

/// Rewrites `locals()[key]` as a reference to the named local binding.
pub struct LocalsPass<'a> {
    analyzer: &'a Analyzer<'a>,
}

impl<'a> LocalsPass<'a> {
    pub fn new(analyzer: &'a Analyzer<'a>) -> Self {
        Self { analyzer }
    }
}

impl Pass for LocalsPass<'_> {
    fn name(&self) -> &str {
        "Locals Simplification"
    }

    fn run(&mut self, program: &mut Program) -> bool {
        let mut modified = false;
        let mut cursor = program.cursor();
        while let Some(inst) = cursor.advance(program) {
            let data = program.insn(inst);
            if self.analyzer.constant_callee(data) != Some(WellKnown::Locals) {
                continue;
            }
            let Some(var) = data.result() else {
                continue;
            };

            let users: Vec<Inst> = program.uses(var).collect();
            let mut replaceable = vec![];
            for user in users {
                let item = program.insn(user);
                if item.op() == Opcode::GetItem
                    && item.args().len() == 2
                    && item.args().first().and_then(Value::as_var) == Some(var)
                {
                    replaceable.push(user);
                }
            }

            for user in replaceable {
                let key = program.insn(user).arg(1).clone();
                let replacement = program.create_var_insn(Opcode::Local, vec![key]);
                program
                    .replace(user, replacement)
                    .expect("a fresh definition may replace the lookup");
                modified = true;
            }

            if !program.has_uses(inst) {
                cursor
                    .remove(program)
                    .expect("the call has no remaining uses");
                modified = true;
            }
        }
        modified
    }
}
