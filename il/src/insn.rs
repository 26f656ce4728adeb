use std::fmt;

use cranelift_entity::entity_impl;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::{Value, Var};

/// A handle to a single instruction
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// The operation performed by an instruction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Designate the argument as the reconstructed object
    Stop,
    /// Call a callable with an argument tuple
    Call,
    /// Resolve a named global from module/name operands
    Global,
    GetAttr,
    SetAttr,
    GetItem,
    SetItem,
    /// A reference to a local binding of the original frame
    Local,
    /// Materialize a fresh mutable object from a constant seed
    MutableConstant,
    /// Apply serialized state to an object (`__setstate__` semantics)
    Build,
    Len,
    /// Append every element of an iterable to a sequence
    Extend,
    Equals,
    NotEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Lshift,
    Rshift,
    /// Records a lifting failure; inert under all transformations
    Poison,
}

impl Opcode {
    /// Returns true if this opcode mutates the reconstructed object graph,
    /// terminates it, or records a failure.
    ///
    /// `Call` is not in this set: its effects depend on the callee and are
    /// classified separately.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Self::Stop | Self::SetAttr | Self::SetItem | Self::Build | Self::Extend | Self::Poison
        )
    }

    /// Returns true if the lifter produces a value-defining instruction for
    /// this opcode.
    pub fn defines_value(&self) -> bool {
        !self.has_side_effects()
    }

    /// Returns true for the two-operand comparison, arithmetic and bitwise
    /// operators.
    pub fn is_binary(&self) -> bool {
        self.is_comparison()
            || matches!(
                self,
                Self::Add
                    | Self::Sub
                    | Self::Mul
                    | Self::FloorDiv
                    | Self::TrueDiv
                    | Self::Mod
                    | Self::Pow
                    | Self::BitwiseAnd
                    | Self::BitwiseOr
                    | Self::BitwiseXor
                    | Self::Lshift
                    | Self::Rshift
            )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessEquals
                | Self::GreaterThan
                | Self::GreaterEquals
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::Call => f.write_str("call"),
            Self::Global => f.write_str("global"),
            Self::GetAttr => f.write_str("get_attr"),
            Self::SetAttr => f.write_str("set_attr"),
            Self::GetItem => f.write_str("get_item"),
            Self::SetItem => f.write_str("set_item"),
            Self::Local => f.write_str("local"),
            Self::MutableConstant => f.write_str("mutable_constant"),
            Self::Build => f.write_str("build"),
            Self::Len => f.write_str("len"),
            Self::Extend => f.write_str("extend"),
            Self::Equals => f.write_str("equals"),
            Self::NotEquals => f.write_str("not_equals"),
            Self::LessThan => f.write_str("less_than"),
            Self::LessEquals => f.write_str("less_equals"),
            Self::GreaterThan => f.write_str("greater_than"),
            Self::GreaterEquals => f.write_str("greater_equals"),
            Self::Add => f.write_str("add"),
            Self::Sub => f.write_str("sub"),
            Self::Mul => f.write_str("mul"),
            Self::FloorDiv => f.write_str("floor_div"),
            Self::TrueDiv => f.write_str("true_div"),
            Self::Mod => f.write_str("mod"),
            Self::Pow => f.write_str("pow"),
            Self::BitwiseAnd => f.write_str("bitwise_and"),
            Self::BitwiseOr => f.write_str("bitwise_or"),
            Self::BitwiseXor => f.write_str("bitwise_xor"),
            Self::Lshift => f.write_str("lshift"),
            Self::Rshift => f.write_str("rshift"),
            Self::Poison => f.write_str("poison"),
        }
    }
}

/// The data for one instruction: its operation, ordered argument list, the
/// SSA variable it defines (if any), and the cached set of variables its
/// arguments read.
#[derive(Debug)]
pub struct InsnData {
    op: Opcode,
    args: SmallVec<[Value; 2]>,
    result: Option<Var>,
    defs: FxHashSet<Var>,
}

impl InsnData {
    pub(super) fn new(op: Opcode, args: SmallVec<[Value; 2]>, result: Option<Var>) -> Self {
        let defs = Value::compute_defs(&args);
        Self {
            op,
            args,
            result,
            defs,
        }
    }

    pub fn op(&self) -> Opcode {
        self.op
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> &Value {
        &self.args[index]
    }

    /// The variable this instruction defines, or `None` for a plain
    /// side-effecting instruction.
    pub fn result(&self) -> Option<Var> {
        self.result
    }

    /// The variables read (transitively) by this instruction's arguments.
    pub fn defs(&self) -> &FxHashSet<Var> {
        &self.defs
    }

    pub fn reads(&self, var: Var) -> bool {
        self.defs.contains(&var)
    }

    pub(super) fn substitute(&mut self, old: Var, replacement: &Value) {
        for arg in self.args.iter_mut() {
            arg.substitute(old, replacement);
        }
        self.defs = Value::compute_defs(&self.args);
    }
}

impl fmt::Display for InsnData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(var) = self.result {
            write!(f, "{} = ", var)?;
        }
        write!(f, "{}", self.op)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", arg)?;
            } else {
                write!(f, ", {}", arg)?;
            }
        }
        Ok(())
    }
}
