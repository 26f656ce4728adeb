//! Constant evaluation with the semantics of the original runtime: integer
//! division floors toward negative infinity, true division always yields a
//! float, exponentiation yields a float when an operand is a float or the
//! exponent is negative, and the bit operations are arbitrary-precision.
//!
//! Every function here is total: an operation the runtime would raise on, or
//! a result too large to be worth materializing, comes back as `None` and the
//! instruction is simply left unfolded.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, Pow, Signed, ToPrimitive, Zero};

use peekle_il::{Opcode, Scalar};

/// Bounds on materialized results. Folding is optional, so anything larger is
/// left to the runtime.
const MAX_SHIFT_BITS: u64 = 1 << 16;
const MAX_POW_BITS: u64 = 1 << 20;
const MAX_REPEAT_BYTES: usize = 1 << 20;

enum Num {
    Int(BigInt),
    Float(f64),
}

fn numeric(scalar: &Scalar) -> Option<Num> {
    match scalar {
        Scalar::Bool(b) => Some(Num::Int(BigInt::from(*b as u8))),
        Scalar::Int(i) => Some(Num::Int(i.clone())),
        Scalar::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn as_int(scalar: &Scalar) -> Option<BigInt> {
    match scalar {
        Scalar::Bool(b) => Some(BigInt::from(*b as u8)),
        Scalar::Int(i) => Some(i.clone()),
        _ => None,
    }
}

fn to_f64(num: &Num) -> Option<f64> {
    match num {
        Num::Int(i) => i.to_f64(),
        Num::Float(f) => Some(*f),
    }
}

/// Exact comparison of an integer against a float, without rounding the
/// integer through f64.
fn cmp_int_float(i: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f == f64::INFINITY {
        return Some(Ordering::Less);
    }
    if f == f64::NEG_INFINITY {
        return Some(Ordering::Greater);
    }
    let floor = f.floor();
    let floor_int = BigInt::from_f64(floor)?;
    Some(match i.cmp(&floor_int) {
        Ordering::Less => Ordering::Less,
        Ordering::Greater => Ordering::Greater,
        Ordering::Equal => {
            if f > floor {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        }
    })
}

fn num_cmp(a: &Num, b: &Num) -> Option<Ordering> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(y)),
        (Num::Float(x), Num::Float(y)) => x.partial_cmp(y),
        (Num::Int(x), Num::Float(y)) => cmp_int_float(x, *y),
        (Num::Float(x), Num::Int(y)) => cmp_int_float(y, *x).map(Ordering::reverse),
    }
}

/// Equality as the source runtime defines it: numeric values compare exactly
/// across int/bool/float; other kinds compare only within themselves, and
/// mismatched kinds are unequal rather than an error.
pub fn py_eq(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::None, Scalar::None) => true,
        (Scalar::Str(x), Scalar::Str(y)) => x == y,
        (Scalar::Bytes(x), Scalar::Bytes(y)) => x == y,
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => num_cmp(&x, &y) == Some(Ordering::Equal),
            _ => false,
        },
    }
}

/// Ordering as the source runtime defines it; `None` where it would raise.
pub fn py_cmp(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Str(x), Scalar::Str(y)) => Some(x.cmp(y)),
        (Scalar::Bytes(x), Scalar::Bytes(y)) => Some(x.cmp(y)),
        _ => num_cmp(&numeric(a)?, &numeric(b)?),
    }
}

/// Evaluate a binary operator over two scalar constants.
pub fn fold_binary(op: Opcode, a: &Scalar, b: &Scalar) -> Option<Scalar> {
    match op {
        Opcode::Equals => Some(Scalar::Bool(py_eq(a, b))),
        Opcode::NotEquals => Some(Scalar::Bool(!py_eq(a, b))),
        Opcode::LessThan => py_cmp(a, b).map(|ord| Scalar::Bool(ord == Ordering::Less)),
        Opcode::LessEquals => py_cmp(a, b).map(|ord| Scalar::Bool(ord != Ordering::Greater)),
        Opcode::GreaterThan => py_cmp(a, b).map(|ord| Scalar::Bool(ord == Ordering::Greater)),
        Opcode::GreaterEquals => py_cmp(a, b).map(|ord| Scalar::Bool(ord != Ordering::Less)),
        Opcode::Add => fold_add(a, b),
        Opcode::Sub => fold_numeric(op, a, b),
        Opcode::Mul => fold_mul(a, b),
        Opcode::FloorDiv | Opcode::TrueDiv | Opcode::Mod | Opcode::Pow => fold_numeric(op, a, b),
        Opcode::BitwiseAnd | Opcode::BitwiseOr | Opcode::BitwiseXor => fold_bitwise(op, a, b),
        Opcode::Lshift | Opcode::Rshift => fold_shift(op, a, b),
        _ => None,
    }
}

fn fold_add(a: &Scalar, b: &Scalar) -> Option<Scalar> {
    match (a, b) {
        (Scalar::Str(x), Scalar::Str(y)) => Some(Scalar::Str(format!("{x}{y}"))),
        (Scalar::Bytes(x), Scalar::Bytes(y)) => {
            let mut out = x.clone();
            out.extend_from_slice(y);
            Some(Scalar::Bytes(out))
        }
        _ => fold_numeric(Opcode::Add, a, b),
    }
}

fn fold_mul(a: &Scalar, b: &Scalar) -> Option<Scalar> {
    match (a, b) {
        (Scalar::Str(s), n) | (n, Scalar::Str(s)) if as_int(n).is_some() => {
            let count = clamp_repeat(&as_int(n)?, s.len())?;
            Some(Scalar::Str(s.repeat(count)))
        }
        (Scalar::Bytes(s), n) | (n, Scalar::Bytes(s)) if as_int(n).is_some() => {
            let count = clamp_repeat(&as_int(n)?, s.len())?;
            Some(Scalar::Bytes(s.repeat(count)))
        }
        _ => fold_numeric(Opcode::Mul, a, b),
    }
}

/// Repetition count for sequence repetition; negative counts yield the empty
/// sequence.
fn clamp_repeat(n: &BigInt, unit: usize) -> Option<usize> {
    if n.is_negative() {
        return Some(0);
    }
    let n = n.to_usize()?;
    if unit.saturating_mul(n) > MAX_REPEAT_BYTES {
        return None;
    }
    Some(n)
}

fn fold_numeric(op: Opcode, a: &Scalar, b: &Scalar) -> Option<Scalar> {
    let (x, y) = (numeric(a)?, numeric(b)?);
    match (&x, &y) {
        (Num::Int(xi), Num::Int(yi)) => match op {
            // The integer operations that leave the integers: true division,
            // and exponentiation by a negative power.
            Opcode::TrueDiv => fold_float(op, to_f64(&x)?, to_f64(&y)?),
            Opcode::Pow if yi.is_negative() => fold_float(op, to_f64(&x)?, to_f64(&y)?),
            _ => fold_int(op, xi, yi),
        },
        _ => fold_float(op, to_f64(&x)?, to_f64(&y)?),
    }
}

fn fold_int(op: Opcode, x: &BigInt, y: &BigInt) -> Option<Scalar> {
    let result = match op {
        Opcode::Add => x + y,
        Opcode::Sub => x - y,
        Opcode::Mul => x * y,
        Opcode::FloorDiv => {
            if y.is_zero() {
                return None;
            }
            x.div_floor(y)
        }
        Opcode::Mod => {
            if y.is_zero() {
                return None;
            }
            x.mod_floor(y)
        }
        Opcode::Pow => {
            if y.is_negative() {
                // int ** -n is a float
                return None;
            }
            let exponent = y.to_u32()?;
            if x.bits().saturating_mul(u64::from(exponent)) > MAX_POW_BITS {
                return None;
            }
            Pow::pow(x, exponent)
        }
        _ => return None,
    };
    Some(Scalar::Int(result))
}

fn fold_float(op: Opcode, x: f64, y: f64) -> Option<Scalar> {
    let result = match op {
        Opcode::Add => x + y,
        Opcode::Sub => x - y,
        Opcode::Mul => x * y,
        Opcode::TrueDiv => {
            if y == 0.0 {
                return None;
            }
            x / y
        }
        Opcode::FloorDiv => {
            if y == 0.0 {
                return None;
            }
            (x / y).floor()
        }
        Opcode::Mod => {
            if y == 0.0 {
                return None;
            }
            // remainder takes the sign of the divisor
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        Opcode::Pow => {
            if x == 0.0 && y < 0.0 {
                return None;
            }
            if x < 0.0 && y.fract() != 0.0 {
                // complex result
                return None;
            }
            x.powf(y)
        }
        _ => return None,
    };
    Some(Scalar::Float(result))
}

fn fold_bitwise(op: Opcode, a: &Scalar, b: &Scalar) -> Option<Scalar> {
    let (x, y) = (as_int(a)?, as_int(b)?);
    let result = match op {
        Opcode::BitwiseAnd => x & y,
        Opcode::BitwiseOr => x | y,
        Opcode::BitwiseXor => x ^ y,
        _ => return None,
    };
    // bool op bool stays bool
    if let (Scalar::Bool(_), Scalar::Bool(_)) = (a, b) {
        return Some(Scalar::Bool(!result.is_zero()));
    }
    Some(Scalar::Int(result))
}

fn fold_shift(op: Opcode, a: &Scalar, b: &Scalar) -> Option<Scalar> {
    let x = as_int(a)?;
    let n = as_int(b)?;
    if n.is_negative() {
        return None;
    }
    let n = n.to_u64()?;
    if n > MAX_SHIFT_BITS {
        return None;
    }
    let result = match op {
        Opcode::Lshift => x << n as usize,
        Opcode::Rshift => x >> n as usize,
        _ => return None,
    };
    Some(Scalar::Int(result))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn int(v: i64) -> Scalar {
        Scalar::from(v)
    }

    fn fold(op: Opcode, a: Scalar, b: Scalar) -> Option<Scalar> {
        fold_binary(op, &a, &b)
    }

    #[test]
    fn integer_arithmetic_floors_toward_negative_infinity() {
        assert_eq!(fold(Opcode::Add, int(1), int(2)), Some(int(3)));
        assert_eq!(fold(Opcode::FloorDiv, int(7), int(2)), Some(int(3)));
        assert_eq!(fold(Opcode::FloorDiv, int(-7), int(2)), Some(int(-4)));
        assert_eq!(fold(Opcode::Mod, int(7), int(-3)), Some(int(-2)));
        assert_eq!(fold(Opcode::Mod, int(-7), int(3)), Some(int(2)));
    }

    #[test]
    fn true_division_always_yields_float() {
        assert_eq!(fold(Opcode::TrueDiv, int(1), int(2)), Some(Scalar::from(0.5)));
        assert_eq!(fold(Opcode::TrueDiv, int(1), int(0)), None);
        assert_eq!(fold(Opcode::TrueDiv, Scalar::from(1.0), Scalar::from(0.0)), None);
    }

    #[test]
    fn exponentiation() {
        assert_eq!(fold(Opcode::Pow, int(2), int(10)), Some(int(1024)));
        assert_eq!(fold(Opcode::Pow, int(2), int(-1)), Some(Scalar::from(0.5)));
        assert_eq!(fold(Opcode::Pow, int(0), int(-1)), None);
        assert_eq!(
            fold(Opcode::Pow, Scalar::from(2.0), int(2)),
            Some(Scalar::from(4.0))
        );
        // complex results are left unfolded
        assert_eq!(fold(Opcode::Pow, Scalar::from(-2.0), Scalar::from(0.5)), None);
    }

    #[test]
    fn arbitrary_precision_bit_operations() {
        assert_eq!(fold(Opcode::BitwiseAnd, int(7), int(3)), Some(int(3)));
        assert_eq!(fold(Opcode::BitwiseXor, int(7), int(2)), Some(int(5)));
        let big = fold(Opcode::Lshift, int(1), int(70)).unwrap();
        assert_eq!(big.to_string(), "1180591620717411303424");
        assert_eq!(fold(Opcode::Rshift, int(1), int(-1)), None);
        assert_eq!(
            fold(Opcode::BitwiseAnd, Scalar::from(true), Scalar::from(true)),
            Some(Scalar::from(true))
        );
    }

    #[test]
    fn sequences_concatenate_and_repeat() {
        assert_eq!(
            fold(Opcode::Add, Scalar::from("ab"), Scalar::from("cd")),
            Some(Scalar::from("abcd"))
        );
        assert_eq!(
            fold(Opcode::Mul, Scalar::from("ab"), int(3)),
            Some(Scalar::from("ababab"))
        );
        assert_eq!(fold(Opcode::Mul, int(-1), Scalar::from("ab")), Some(Scalar::from("")));
        assert_eq!(
            fold(Opcode::Add, Scalar::from(b"a".to_vec()), Scalar::from(b"b".to_vec())),
            Some(Scalar::from(b"ab".to_vec()))
        );
        // mixed-kind arithmetic would raise; leave it alone
        assert_eq!(fold(Opcode::Add, Scalar::from("a"), int(1)), None);
    }

    #[test]
    fn comparisons_cross_numeric_kinds() {
        assert_eq!(fold(Opcode::Equals, int(1), Scalar::from(1.0)), Some(Scalar::from(true)));
        assert_eq!(
            fold(Opcode::Equals, Scalar::from(true), int(1)),
            Some(Scalar::from(true))
        );
        assert_eq!(
            fold(Opcode::Equals, Scalar::from("a"), int(1)),
            Some(Scalar::from(false))
        );
        assert_eq!(
            fold(Opcode::LessThan, int(2), Scalar::from(2.5)),
            Some(Scalar::from(true))
        );
        assert_eq!(
            fold(Opcode::LessThan, Scalar::from("a"), Scalar::from("b")),
            Some(Scalar::from(true))
        );
        // unordered operands are left unfolded
        assert_eq!(fold(Opcode::LessThan, Scalar::from("a"), int(1)), None);
        assert_eq!(fold(Opcode::Equals, Scalar::None, Scalar::None), Some(Scalar::from(true)));
    }

    #[test]
    fn huge_results_are_left_unfolded() {
        assert_eq!(fold(Opcode::Lshift, int(1), int(1 << 20)), None);
        assert_eq!(fold(Opcode::Mul, Scalar::from("a"), int(1 << 30)), None);
        let big = fold(Opcode::Pow, int(10), int(1 << 20));
        assert_eq!(big, None);
    }
}
