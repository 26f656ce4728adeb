use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use peekle_il::Opcode;

/// The primitive classes of the original runtime whose bound dunder methods
/// the optimizer recognizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PyClass {
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    ByteArray,
    List,
    Tuple,
    Dict,
    Set,
    FrozenSet,
}

impl PyClass {
    pub const ALL: [PyClass; 11] = [
        Self::Int,
        Self::Float,
        Self::Complex,
        Self::Str,
        Self::Bytes,
        Self::ByteArray,
        Self::List,
        Self::Tuple,
        Self::Dict,
        Self::Set,
        Self::FrozenSet,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::ByteArray => "bytearray",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Dict => "dict",
            Self::Set => "set",
            Self::FrozenSet => "frozenset",
        }
    }

    /// Whether the class itself provides `method`, mirroring the host's class
    /// dictionaries. The six rich comparisons come from the object protocol
    /// and exist on every class.
    pub fn has_dunder(&self, method: DunderMethod) -> bool {
        use DunderMethod::*;
        match method {
            Eq | Ne | Lt | Le | Gt | Ge => true,
            GetItem => matches!(
                self,
                Self::Str | Self::Bytes | Self::ByteArray | Self::List | Self::Tuple | Self::Dict
            ),
            SetItem => matches!(self, Self::ByteArray | Self::List | Self::Dict),
            Len => matches!(
                self,
                Self::Str
                    | Self::Bytes
                    | Self::ByteArray
                    | Self::List
                    | Self::Tuple
                    | Self::Dict
                    | Self::Set
                    | Self::FrozenSet
            ),
            Add => matches!(
                self,
                Self::Int
                    | Self::Float
                    | Self::Complex
                    | Self::Str
                    | Self::Bytes
                    | Self::ByteArray
                    | Self::List
                    | Self::Tuple
            ),
            Sub => matches!(
                self,
                Self::Int | Self::Float | Self::Complex | Self::Set | Self::FrozenSet
            ),
            Mul => matches!(
                self,
                Self::Int
                    | Self::Float
                    | Self::Complex
                    | Self::Str
                    | Self::Bytes
                    | Self::ByteArray
                    | Self::List
                    | Self::Tuple
            ),
            FloorDiv => matches!(self, Self::Int | Self::Float),
            TrueDiv => matches!(self, Self::Int | Self::Float | Self::Complex),
            Mod => matches!(
                self,
                Self::Int | Self::Float | Self::Str | Self::Bytes | Self::ByteArray
            ),
            Pow => matches!(self, Self::Int | Self::Float | Self::Complex),
            And | Or | Xor => matches!(self, Self::Int | Self::Set | Self::FrozenSet),
            Lshift | Rshift => matches!(self, Self::Int),
        }
    }
}

/// The dunder methods with a structural counterpart in the IL.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DunderMethod {
    GetItem,
    SetItem,
    Len,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
    And,
    Or,
    Xor,
    Lshift,
    Rshift,
}

impl DunderMethod {
    pub const ALL: [DunderMethod; 21] = [
        Self::GetItem,
        Self::SetItem,
        Self::Len,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::FloorDiv,
        Self::TrueDiv,
        Self::Mod,
        Self::Pow,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Lshift,
        Self::Rshift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetItem => "__getitem__",
            Self::SetItem => "__setitem__",
            Self::Len => "__len__",
            Self::Eq => "__eq__",
            Self::Ne => "__ne__",
            Self::Lt => "__lt__",
            Self::Le => "__le__",
            Self::Gt => "__gt__",
            Self::Ge => "__ge__",
            Self::Add => "__add__",
            Self::Sub => "__sub__",
            Self::Mul => "__mul__",
            Self::FloorDiv => "__floordiv__",
            Self::TrueDiv => "__truediv__",
            Self::Mod => "__mod__",
            Self::Pow => "__pow__",
            Self::And => "__and__",
            Self::Or => "__or__",
            Self::Xor => "__xor__",
            Self::Lshift => "__lshift__",
            Self::Rshift => "__rshift__",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    /// The opcode an instance-level call of this method lowers to.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::GetItem => Opcode::GetItem,
            Self::SetItem => Opcode::SetItem,
            Self::Len => Opcode::Len,
            Self::Eq => Opcode::Equals,
            Self::Ne => Opcode::NotEquals,
            Self::Lt => Opcode::LessThan,
            Self::Le => Opcode::LessEquals,
            Self::Gt => Opcode::GreaterThan,
            Self::Ge => Opcode::GreaterEquals,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Mul => Opcode::Mul,
            Self::FloorDiv => Opcode::FloorDiv,
            Self::TrueDiv => Opcode::TrueDiv,
            Self::Mod => Opcode::Mod,
            Self::Pow => Opcode::Pow,
            Self::And => Opcode::BitwiseAnd,
            Self::Or => Opcode::BitwiseOr,
            Self::Xor => Opcode::BitwiseXor,
            Self::Lshift => Opcode::Lshift,
            Self::Rshift => Opcode::Rshift,
        }
    }

    /// The number of arguments the method takes beyond its receiver.
    pub fn arity(&self) -> usize {
        match self {
            Self::Len => 0,
            Self::SetItem => 2,
            _ => 1,
        }
    }
}

/// The identity of a host callable recognized by the optimizer.
///
/// A same-host implementation compares actual object identities; here the
/// oracle collapses resolution straight to these identities, so that shipping
/// a manifest of well-known symbol paths reproduces the original host's
/// behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Import,
    Abs,
    Bin,
    Chr,
    Dir,
    Getattr,
    Globals,
    Hasattr,
    Hash,
    Hex,
    Id,
    Len,
    Locals,
    Map,
    Max,
    Min,
    Oct,
    Partial,
    Range,
    Round,
    Setattr,
    /// A bound dunder method of a primitive class, e.g. `int.__add__`
    BoundDunder(PyClass, DunderMethod),
}

/// Read-only reflection over the host environment: resolve a symbolic global
/// to a recognized callable, or report that it is absent.
///
/// This is the only external collaborator the passes consult. It is injected
/// so tests can pin the environment to a fixture, and so the tool can emulate
/// the original host's standard-library identity rather than its own.
pub trait Oracle {
    fn resolve(&self, module: &str, name: Option<&str>) -> Option<WellKnown>;
}

/// The canonical oracle: a manifest of the well-known symbols of the original
/// host's standard library (`builtins`, plus `functools.partial`), with the
/// bound dunders of every primitive class that actually defines them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticOracle;

lazy_static! {
    static ref BUILTINS: FxHashMap<String, WellKnown> = {
        let mut map = FxHashMap::default();
        for (name, target) in [
            ("__import__", WellKnown::Import),
            ("abs", WellKnown::Abs),
            ("bin", WellKnown::Bin),
            ("chr", WellKnown::Chr),
            ("dir", WellKnown::Dir),
            ("getattr", WellKnown::Getattr),
            ("globals", WellKnown::Globals),
            ("hasattr", WellKnown::Hasattr),
            ("hash", WellKnown::Hash),
            ("hex", WellKnown::Hex),
            ("id", WellKnown::Id),
            ("len", WellKnown::Len),
            ("locals", WellKnown::Locals),
            ("map", WellKnown::Map),
            ("max", WellKnown::Max),
            ("min", WellKnown::Min),
            ("oct", WellKnown::Oct),
            ("range", WellKnown::Range),
            ("round", WellKnown::Round),
            ("setattr", WellKnown::Setattr),
        ] {
            map.insert(name.to_string(), target);
        }
        for class in PyClass::ALL {
            for method in DunderMethod::ALL {
                if class.has_dunder(method) {
                    map.insert(
                        format!("{}.{}", class.name(), method.name()),
                        WellKnown::BoundDunder(class, method),
                    );
                }
            }
        }
        map
    };
}

impl Oracle for StaticOracle {
    fn resolve(&self, module: &str, name: Option<&str>) -> Option<WellKnown> {
        let name = name?;
        match module {
            "builtins" => BUILTINS.get(name).copied(),
            "functools" => (name == "partial").then_some(WellKnown::Partial),
            _ => None,
        }
    }
}

/// A fixture oracle backed by an explicit table.
#[derive(Debug, Default)]
pub struct TableOracle {
    entries: FxHashMap<(String, Option<String>), WellKnown>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: &str, name: Option<&str>, target: WellKnown) {
        self.entries
            .insert((module.to_string(), name.map(str::to_string)), target);
    }
}

impl Oracle for TableOracle {
    fn resolve(&self, module: &str, name: Option<&str>) -> Option<WellKnown> {
        self.entries
            .get(&(module.to_string(), name.map(str::to_string)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_oracle_resolves_builtins_and_bound_dunders() {
        let oracle = StaticOracle;
        assert_eq!(
            oracle.resolve("builtins", Some("getattr")),
            Some(WellKnown::Getattr)
        );
        assert_eq!(
            oracle.resolve("builtins", Some("int.__add__")),
            Some(WellKnown::BoundDunder(PyClass::Int, DunderMethod::Add))
        );
        assert_eq!(
            oracle.resolve("functools", Some("partial")),
            Some(WellKnown::Partial)
        );
    }

    #[test]
    fn static_oracle_respects_class_dictionaries() {
        let oracle = StaticOracle;
        // str has no __and__, tuple has no __setitem__
        assert_eq!(oracle.resolve("builtins", Some("str.__and__")), None);
        assert_eq!(oracle.resolve("builtins", Some("tuple.__setitem__")), None);
        // but everything has the rich comparisons
        assert!(oracle.resolve("builtins", Some("dict.__eq__")).is_some());
        assert_eq!(oracle.resolve("os", Some("getcwd")), None);
        assert_eq!(oracle.resolve("builtins", None), None);
    }
}
