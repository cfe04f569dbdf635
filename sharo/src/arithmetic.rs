//! Numeric semantics of the arithmetic, conversion and comparison opcodes.
//!
//! Integer arithmetic wraps. Only string concatenation needs the heap, the
//! interpreter handles that before falling back to [`generic`].
use std::cmp::Ordering;

use crate::{RuntimeError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    #[inline]
    fn int(self, a: i64, b: i64) -> Result<i64, RuntimeError> {
        Ok(match self {
            Self::Add => a.wrapping_add(b),
            Self::Subtract => a.wrapping_sub(b),
            Self::Multiply => a.wrapping_mul(b),
            Self::Divide => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            Self::Modulo => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_rem(b)
            }
        })
    }

    #[inline]
    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Modulo => a % b,
        }
    }
}

/// `*_INT` opcodes.
#[inline]
pub fn int(op: BinaryOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => op.int(a, b).map(Value::Int),
        _ => Err(RuntimeError::IntOperands),
    }
}

/// `*_FLOAT` opcodes. There is no float modulo opcode but the operation is
/// still defined.
#[inline]
pub fn float(op: BinaryOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(op.float(a, b))),
        _ => Err(RuntimeError::FloatOperands),
    }
}

/// Generic opcodes on numbers: two ints stay ints, any other numeric pair is
/// promoted to float. Float `%` is allowed here; only the `*Int` forms are
/// int-only.
#[inline]
pub fn generic(op: BinaryOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => op.int(a, b).map(Value::Int),
        _ => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Float(op.float(a, b))),
            _ if op == BinaryOp::Add => Err(RuntimeError::AddOperands),
            _ => Err(RuntimeError::NumberOperands),
        },
    }
}

pub fn negate(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(RuntimeError::NumberOperand),
    }
}

pub fn negate_int(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        _ => Err(RuntimeError::IntOperand),
    }
}

pub fn negate_float(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(RuntimeError::FloatOperand),
    }
}

pub fn int_to_float(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        _ => Err(RuntimeError::ExpectedInt),
    }
}

/// Truncates toward zero, saturating at the `i64` range. NaN becomes 0.
pub fn float_to_int(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Float(f) => Ok(Value::Int(f as i64)),
        _ => Err(RuntimeError::ExpectedFloat),
    }
}

/// `+1` in place, for `INC_LOCAL`.
pub fn increment(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_add(1))),
        Value::Float(f) => Ok(Value::Float(f + 1.0)),
        _ => Err(RuntimeError::NumberOperand),
    }
}

/// Ordering for `GREATER`, `LESS` and friends. `None` when a float
/// comparison involves NaN, which makes every ordered comparison false.
#[inline]
pub fn compare(a: Value, b: Value) -> Result<Option<Ordering>, RuntimeError> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(&b))),
        _ => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(RuntimeError::NumberOperands),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_truncates() {
        assert_eq!(
            generic(BinaryOp::Divide, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            generic(BinaryOp::Divide, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(-3)
        );
        assert_eq!(
            generic(BinaryOp::Modulo, Value::Int(-7), Value::Int(2)).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn mixed_operands_promote() {
        let sum = generic(BinaryOp::Add, Value::Int(7), Value::Float(0.5)).unwrap();
        assert!(matches!(sum, Value::Float(f) if f == 7.5));
        let quotient = generic(BinaryOp::Divide, Value::Float(7.0), Value::Float(2.0)).unwrap();
        assert!(matches!(quotient, Value::Float(f) if f == 3.5));
        let rem = generic(BinaryOp::Modulo, Value::Float(7.5), Value::Int(2)).unwrap();
        assert!(matches!(rem, Value::Float(f) if f == 1.5));
    }

    #[test]
    fn division_by_zero() {
        for op in [BinaryOp::Divide, BinaryOp::Modulo] {
            assert_eq!(
                generic(op, Value::Int(1), Value::Int(0)),
                Err(RuntimeError::DivisionByZero)
            );
            assert_eq!(
                int(op, Value::Int(1), Value::Int(0)),
                Err(RuntimeError::DivisionByZero)
            );
        }
        // float division follows IEEE
        let inf = generic(BinaryOp::Divide, Value::Float(1.0), Value::Int(0)).unwrap();
        assert!(matches!(inf, Value::Float(f) if f.is_infinite()));
    }

    #[test]
    fn overflow_wraps() {
        assert_eq!(
            int(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1)).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            int(BinaryOp::Divide, Value::Int(i64::MIN), Value::Int(-1)).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(
            int(BinaryOp::Modulo, Value::Int(i64::MIN), Value::Int(-1)).unwrap(),
            Value::Int(0)
        );
        assert_eq!(negate(Value::Int(i64::MIN)).unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn specialised_forms_check_types() {
        assert_eq!(
            int(BinaryOp::Add, Value::Int(1), Value::Float(1.0)),
            Err(RuntimeError::IntOperands)
        );
        assert_eq!(
            float(BinaryOp::Add, Value::Int(1), Value::Float(1.0)),
            Err(RuntimeError::FloatOperands)
        );
        assert_eq!(negate_int(Value::Float(1.0)), Err(RuntimeError::IntOperand));
        assert_eq!(negate_float(Value::Int(1)), Err(RuntimeError::FloatOperand));
    }

    #[test]
    fn generic_type_errors() {
        assert_eq!(
            generic(BinaryOp::Add, Value::Nil, Value::Int(1)),
            Err(RuntimeError::AddOperands)
        );
        assert_eq!(
            generic(BinaryOp::Multiply, Value::Bool(true), Value::Int(1)),
            Err(RuntimeError::NumberOperands)
        );
        assert_eq!(negate(Value::Nil), Err(RuntimeError::NumberOperand));
        assert_eq!(increment(Value::Nil), Err(RuntimeError::NumberOperand));
    }

    #[test]
    fn conversions() {
        assert_eq!(int_to_float(Value::Int(3)).unwrap(), Value::Float(3.0));
        assert_eq!(float_to_int(Value::Float(-3.9)).unwrap(), Value::Int(-3));
        assert_eq!(float_to_int(Value::Float(f64::NAN)).unwrap(), Value::Int(0));
        assert_eq!(float_to_int(Value::Float(1e30)).unwrap(), Value::Int(i64::MAX));
        assert_eq!(int_to_float(Value::Float(1.0)), Err(RuntimeError::ExpectedInt));
        assert_eq!(float_to_int(Value::Int(1)), Err(RuntimeError::ExpectedFloat));
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            compare(Value::Int(1), Value::Int(2)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(Value::Float(2.5), Value::Int(2)).unwrap(),
            Some(Ordering::Greater)
        );
        assert_eq!(compare(Value::Float(f64::NAN), Value::Int(2)).unwrap(), None);
        assert_eq!(
            compare(Value::Nil, Value::Int(2)),
            Err(RuntimeError::NumberOperands)
        );
    }
}
