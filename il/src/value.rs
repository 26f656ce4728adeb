use std::fmt;

use cranelift_entity::entity_impl;
use num_bigint::BigInt;
use rustc_hash::FxHashSet;

use super::display::{self, DisplayValues};

/// A handle to an SSA variable, i.e. the value defined by a variable-defining
/// instruction.
///
/// Variables render as `v<k>`. Names are assigned monotonically by the owning
/// [Program](crate::Program) and are never reused.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(u32);
entity_impl!(Var, "v");

/// A serialized primitive constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// The distinguished null marker
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(BigInt::from(value))
    }
}
impl From<BigInt> for Scalar {
    fn from(value: BigInt) -> Self {
        Self::Int(value)
    }
}
impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}
impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => display::write_float(f, *value),
            Self::Str(value) => display::write_str_repr(f, value),
            Self::Bytes(value) => display::write_bytes_repr(f, value),
        }
    }
}

/// An operand of an instruction.
///
/// Container variants own their elements; a [Value::Var] is a non-owning
/// handle back to the instruction that defines it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Set(Vec<Value>),
    FrozenSet(Vec<Value>),
    /// A symbolic reference to a named global: a module path and an optional
    /// dotted member path within it.
    Global {
        module: String,
        name: Option<String>,
    },
    Var(Var),
}

impl Value {
    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn none() -> Self {
        Self::Scalar(Scalar::None)
    }

    pub fn int(value: i64) -> Self {
        Self::Scalar(Scalar::from(value))
    }

    pub fn str(value: &str) -> Self {
        Self::Scalar(Scalar::from(value))
    }

    pub fn global(module: impl Into<String>, name: Option<&str>) -> Self {
        Self::Global {
            module: module.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<Var> {
        match self {
            Self::Var(var) => Some(*var),
            _ => None,
        }
    }

    /// Accumulate the variables this value transitively depends on.
    pub fn value_defs(&self, defs: &mut FxHashSet<Var>) {
        match self {
            Self::Var(var) => {
                defs.insert(*var);
            }
            Self::Tuple(values)
            | Self::List(values)
            | Self::Set(values)
            | Self::FrozenSet(values) => {
                for value in values {
                    value.value_defs(defs);
                }
            }
            Self::Dict(pairs) => {
                for (key, value) in pairs {
                    key.value_defs(defs);
                    value.value_defs(defs);
                }
            }
            Self::Scalar(_) | Self::Global { .. } => (),
        }
    }

    /// Compute the union of [value_defs](Self::value_defs) over `values`.
    pub fn compute_defs(values: &[Value]) -> FxHashSet<Var> {
        let mut defs = FxHashSet::default();
        for value in values {
            value.value_defs(&mut defs);
        }
        defs
    }

    /// Replace every occurrence of `old` with a copy of `replacement`,
    /// recursing into containers and into dict key/value positions.
    pub fn substitute(&mut self, old: Var, replacement: &Value) {
        match self {
            Self::Var(var) if *var == old => *self = replacement.clone(),
            Self::Tuple(values)
            | Self::List(values)
            | Self::Set(values)
            | Self::FrozenSet(values) => {
                for value in values {
                    value.substitute(old, replacement);
                }
            }
            Self::Dict(pairs) => {
                for (key, value) in pairs {
                    key.substitute(old, replacement);
                    value.substitute(old, replacement);
                }
            }
            _ => (),
        }
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}
impl From<Var> for Value {
    fn from(value: Var) -> Self {
        Self::Var(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{}", scalar),
            Self::Tuple(values) => write!(f, "({})", DisplayValues::new(values.iter())),
            Self::List(values) => write!(f, "[{}]", DisplayValues::new(values.iter())),
            Self::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Self::Set(values) => write!(f, "set({})", DisplayValues::new(values.iter())),
            Self::FrozenSet(values) => {
                write!(f, "frozenset({})", DisplayValues::new(values.iter()))
            }
            Self::Global {
                module,
                name: Some(name),
            } => write!(f, "{}.{}", module, name),
            Self::Global { module, name: None } => f.write_str(module),
            Self::Var(var) => write!(f, "{}", var),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scalar_rendering() {
        assert_eq!(Scalar::None.to_string(), "None");
        assert_eq!(Scalar::Bool(true).to_string(), "True");
        assert_eq!(Scalar::from(-42).to_string(), "-42");
        assert_eq!(Scalar::from(1.0).to_string(), "1.0");
        assert_eq!(Scalar::from(2.5).to_string(), "2.5");
        assert_eq!(Scalar::from("it's").to_string(), "\"it's\"");
        assert_eq!(Scalar::from("a\nb").to_string(), "'a\\nb'");
        assert_eq!(Scalar::from(b"ab\x00".to_vec()).to_string(), "b'ab\\x00'");
    }

    #[test]
    fn container_rendering() {
        let tuple = Value::Tuple(vec![Value::int(1), Value::str("a")]);
        assert_eq!(tuple.to_string(), "(1, 'a')");
        let dict = Value::Dict(vec![(Value::str("a"), Value::int(1))]);
        assert_eq!(dict.to_string(), "{'a': 1}");
        assert_eq!(Value::Tuple(vec![]).to_string(), "()");
        assert_eq!(Value::global("os", Some("path.join")).to_string(), "os.path.join");
        assert_eq!(Value::global("os", None).to_string(), "os");
    }

    #[test]
    fn substitution_recurses_into_containers() {
        let v0 = Var::from_u32(0);
        let mut value = Value::Dict(vec![(
            Value::str("k"),
            Value::Tuple(vec![Value::Var(v0), Value::int(2)]),
        )]);
        value.substitute(v0, &Value::int(7));
        assert_eq!(value.to_string(), "{'k': (7, 2)}");
        assert!(Value::compute_defs(std::slice::from_ref(&value)).is_empty());
    }

    #[test]
    fn value_defs_are_transitive() {
        let v0 = Var::from_u32(0);
        let v1 = Var::from_u32(1);
        let value = Value::List(vec![
            Value::Var(v0),
            Value::Tuple(vec![Value::Var(v1), Value::Var(v0)]),
        ]);
        let defs = Value::compute_defs(std::slice::from_ref(&value));
        assert_eq!(defs.len(), 2);
        assert!(defs.contains(&v0) && defs.contains(&v1));
    }
}
