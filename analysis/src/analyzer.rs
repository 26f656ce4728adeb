use rustc_hash::{FxHashMap, FxHashSet};

use peekle_il::{InsnData, Opcode, Value};

use super::oracle::{DunderMethod, Oracle, PyClass, WellKnown};

/// The fixed dunder table: method name to (replacement opcode, argument count
/// beyond the receiver).
pub fn dunder_op(name: &str) -> Option<(Opcode, usize)> {
    DunderMethod::from_name(name).map(|method| (method.opcode(), method.arity()))
}

/// Callables known to be free of side effects when invoked.
const PURE_CALLS: [(&str, &str); 20] = [
    ("builtins", "__import__"),
    ("builtins", "range"),
    ("builtins", "abs"),
    ("builtins", "bin"),
    ("builtins", "chr"),
    ("builtins", "dir"),
    ("builtins", "getattr"),
    ("builtins", "globals"),
    ("builtins", "hasattr"),
    ("builtins", "hash"),
    ("builtins", "hex"),
    ("builtins", "id"),
    ("builtins", "len"),
    ("builtins", "locals"),
    ("builtins", "map"),
    ("builtins", "max"),
    ("builtins", "min"),
    ("builtins", "oct"),
    ("builtins", "round"),
    ("functools", "partial"),
];

/// Call classification tables, derived once from an [Oracle] at startup.
///
/// `global_calls` maps a recognized callable to the opcode and arity of the
/// structural operation it implements (the content of GLOBAL_CALL_MAP);
/// `pure_calls` is the curated set of callables with no side effects.
pub struct Analyzer<'a> {
    oracle: &'a dyn Oracle,
    global_calls: FxHashMap<WellKnown, (Opcode, usize)>,
    pure_calls: FxHashSet<WellKnown>,
}

impl<'a> Analyzer<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        let mut global_calls = FxHashMap::default();
        if let Some(target) = oracle.resolve("builtins", Some("getattr")) {
            global_calls.insert(target, (Opcode::GetAttr, 2));
        }
        if let Some(target) = oracle.resolve("builtins", Some("setattr")) {
            global_calls.insert(target, (Opcode::SetAttr, 3));
        }
        for class in PyClass::ALL {
            for method in DunderMethod::ALL {
                let path = format!("{}.{}", class.name(), method.name());
                if let Some(target) = oracle.resolve("builtins", Some(&path)) {
                    // Unbound form: the receiver is an explicit first argument.
                    global_calls.insert(target, (method.opcode(), method.arity() + 1));
                }
            }
        }

        let mut pure_calls = FxHashSet::default();
        for (module, name) in PURE_CALLS {
            if let Some(target) = oracle.resolve(module, Some(name)) {
                pure_calls.insert(target);
            }
        }

        log::debug!(
            "analyzer initialized with {} call rewrites, {} pure callables",
            global_calls.len(),
            pure_calls.len()
        );
        Self {
            oracle,
            global_calls,
            pure_calls,
        }
    }

    pub fn oracle(&self) -> &dyn Oracle {
        self.oracle
    }

    /// True if `insn` calls a symbolic global with a literal argument tuple.
    pub fn is_constant_call(&self, insn: &InsnData) -> bool {
        insn.op() == Opcode::Call
            && matches!(insn.args().first(), Some(Value::Global { .. }))
            && matches!(insn.args().get(1), Some(Value::Tuple(_)))
    }

    /// Resolve the callee of a constant call through the oracle.
    pub fn constant_callee(&self, insn: &InsnData) -> Option<WellKnown> {
        if !self.is_constant_call(insn) {
            return None;
        }
        match &insn.args()[0] {
            Value::Global { module, name } => self.oracle.resolve(module, name.as_deref()),
            _ => unreachable!("checked by is_constant_call"),
        }
    }

    /// The structural replacement for a recognized callable, if any.
    pub fn global_call(&self, callee: WellKnown) -> Option<(Opcode, usize)> {
        self.global_calls.get(&callee).copied()
    }

    /// Whether executing `insn` could have an observable effect: it is one of
    /// the store/terminator opcodes, or a call whose callee is non-constant,
    /// absent from the host, or not known to be pure.
    pub fn has_side_effects(&self, insn: &InsnData) -> bool {
        if insn.op().has_side_effects() {
            return true;
        }
        if insn.op() == Opcode::Call {
            return match self.constant_callee(insn) {
                Some(callee) => !self.pure_calls.contains(&callee),
                None => true,
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use peekle_il::Program;

    use super::*;
    use crate::StaticOracle;

    fn call(program: &mut Program, module: &str, name: &str, args: Vec<Value>) -> peekle_il::Inst {
        program.append_var(
            Opcode::Call,
            vec![Value::global(module, Some(name)), Value::Tuple(args)],
        )
    }

    #[test]
    fn recognizes_constant_calls() {
        let oracle = StaticOracle;
        let analyzer = Analyzer::new(&oracle);
        let mut program = Program::new();
        let known = call(&mut program, "builtins", "getattr", vec![]);
        assert!(analyzer.is_constant_call(program.insn(known)));
        assert_eq!(
            analyzer.constant_callee(program.insn(known)),
            Some(WellKnown::Getattr)
        );

        let unresolved = call(&mut program, "os", "getcwd", vec![]);
        assert!(analyzer.is_constant_call(program.insn(unresolved)));
        assert_eq!(analyzer.constant_callee(program.insn(unresolved)), None);

        let dynamic = program.append_var(
            Opcode::Call,
            vec![Value::int(1), Value::Tuple(vec![])],
        );
        assert!(!analyzer.is_constant_call(program.insn(dynamic)));
    }

    #[test]
    fn global_call_map_covers_dunders_with_receiver_arity() {
        let oracle = StaticOracle;
        let analyzer = Analyzer::new(&oracle);
        assert_eq!(
            analyzer.global_call(WellKnown::Getattr),
            Some((Opcode::GetAttr, 2))
        );
        assert_eq!(
            analyzer.global_call(WellKnown::BoundDunder(PyClass::Int, DunderMethod::Add)),
            Some((Opcode::Add, 2))
        );
        assert_eq!(
            analyzer.global_call(WellKnown::BoundDunder(PyClass::List, DunderMethod::SetItem)),
            Some((Opcode::SetItem, 3))
        );
        assert_eq!(
            analyzer.global_call(WellKnown::BoundDunder(PyClass::Str, DunderMethod::Len)),
            Some((Opcode::Len, 1))
        );
        assert_eq!(analyzer.global_call(WellKnown::Locals), None);
    }

    #[test]
    fn side_effect_classification() {
        let oracle = StaticOracle;
        let analyzer = Analyzer::new(&oracle);
        let mut program = Program::new();

        let stop = program.append(Opcode::Stop, vec![Value::none()]);
        assert!(analyzer.has_side_effects(program.insn(stop)));

        let pure = call(&mut program, "builtins", "len", vec![Value::str("x")]);
        assert!(!analyzer.has_side_effects(program.insn(pure)));

        // int.__add__ is recognized but not in the curated pure set
        let dunder = call(&mut program, "builtins", "int.__add__", vec![]);
        assert!(analyzer.has_side_effects(program.insn(dunder)));

        let unknown = call(&mut program, "os", "system", vec![Value::str("id")]);
        assert!(analyzer.has_side_effects(program.insn(unknown)));

        let add = program.append_var(Opcode::Add, vec![Value::int(1), Value::int(2)]);
        assert!(!analyzer.has_side_effects(program.insn(add)));
    }

    #[test]
    fn dunder_table() {
        assert_eq!(dunder_op("__getitem__"), Some((Opcode::GetItem, 1)));
        assert_eq!(dunder_op("__len__"), Some((Opcode::Len, 0)));
        assert_eq!(dunder_op("__setitem__"), Some((Opcode::SetItem, 2)));
        assert_eq!(dunder_op("__repr__"), None);
    }
}
