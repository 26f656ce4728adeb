//! Whole-program structural validation.
//!
//! The pass driver treats a violation here as a programming error, not a data
//! error: lifted input can be poisoned, but it can never corrupt the use/def
//! graph. The checks rebuild everything the [Program] caches incrementally
//! and compare:
//!
//! - every variable is defined by at most one attached instruction, and the
//!   definition precedes every use in list order;
//! - each instruction's def cache equals a recomputation over its arguments;
//! - the maintained use sets are extensionally equal to a from-scratch
//!   rebuild over all attached instructions.
//!
//! Attachment itself (an instruction is either detached or on exactly one
//! list) is enforced structurally by the intrusive list and is not
//! re-checkable from the outside.

use rustc_hash::{FxHashMap, FxHashSet};

use peekle_il::{Inst, Program, Value, Var};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{var} is defined by both {earlier} and {inst}")]
    DuplicateDefinition { var: Var, earlier: Inst, inst: Inst },
    #[error("{user} references {var} before (or without) its definition")]
    UseBeforeDef { user: Inst, var: Var },
    #[error("the def cache of {inst} disagrees with its arguments")]
    DefCacheMismatch { inst: Inst },
    #[error("the use set of {var} disagrees with the program's arguments")]
    UseSetMismatch { var: Var },
}

pub fn validate(program: &Program) -> Result<(), ValidationError> {
    let mut defined: FxHashMap<Var, Inst> = FxHashMap::default();
    let mut rebuilt: FxHashMap<Var, FxHashSet<Inst>> = FxHashMap::default();

    for inst in program.iter() {
        let data = program.insn(inst);
        let recomputed = Value::compute_defs(data.args());
        if recomputed != *data.defs() {
            return Err(ValidationError::DefCacheMismatch { inst });
        }
        for &var in recomputed.iter() {
            if !defined.contains_key(&var) {
                return Err(ValidationError::UseBeforeDef { user: inst, var });
            }
            rebuilt.entry(var).or_default().insert(inst);
        }
        if let Some(var) = data.result() {
            if let Some(&earlier) = defined.get(&var) {
                return Err(ValidationError::DuplicateDefinition { var, earlier, inst });
            }
            defined.insert(var, inst);
        }
    }

    // Extensional equality of the maintained use sets with the rebuild, for
    // every variable the program ever allocated.
    for index in 0..program.variable_count() {
        let var = Var::from_u32(index);
        let maintained: FxHashSet<Inst> = program.uses(var).collect();
        let expected = rebuilt.remove(&var).unwrap_or_default();
        if maintained != expected {
            return Err(ValidationError::UseSetMismatch { var });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use peekle_il::{Opcode, Program, Value};

    use super::*;

    #[test]
    fn accepts_well_formed_programs() {
        let mut program = Program::new();
        let def = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let var = program.result(def).unwrap();
        program.append(Opcode::Extend, vec![Value::Var(var), Value::List(vec![Value::int(1)])]);
        program.append(Opcode::Stop, vec![Value::Var(var)]);
        validate(&program).unwrap();
    }

    #[test]
    fn rejects_a_use_whose_definition_was_force_removed() {
        let mut program = Program::new();
        let def = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let var = program.result(def).unwrap();
        program.append(Opcode::Stop, vec![Value::Var(var)]);
        program.force_remove(def).unwrap();
        assert!(matches!(
            validate(&program),
            Err(ValidationError::UseBeforeDef { .. })
        ));
    }

    #[test]
    fn rejects_a_definition_after_its_use() {
        let mut program = Program::new();
        let def = program.append_var(Opcode::MutableConstant, vec![Value::List(vec![])]);
        let var = program.result(def).unwrap();
        program.append(Opcode::Stop, vec![Value::Var(var)]);
        // Moving the definition to the end puts it after its user.
        program.force_remove(def).unwrap();
        let last = program.last();
        program.insert(def, last).unwrap();
        assert!(matches!(
            validate(&program),
            Err(ValidationError::UseBeforeDef { .. })
        ));
    }
}
