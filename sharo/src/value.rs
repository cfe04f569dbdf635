//! Value: the dynamically typed word the interpreter moves around.
//!
//! ObjRef: an arena handle to a heap object, only meaningful together with
//! the [`Heap`](crate::Heap) that produced it.
use std::ffi::c_void;

/// Handle to a heap object: slot index plus the generation of the slot at
/// allocation time. A handle to a swept object never resolves again, even
/// after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    #[inline(always)]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline(always)]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// A Value
#[derive(Debug, Clone, Copy, Default)]
pub enum Value {
    Bool(bool),
    #[default]
    Nil,
    Int(i64),
    Float(f64),
    /// Host handle passed through untouched. Never traced.
    RawPtr(*mut c_void),
    Object(ObjRef),
}

impl Value {
    #[inline(always)]
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    #[inline(always)]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    #[inline(always)]
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Numeric view with `Int` promoted to `f64`.
    #[inline(always)]
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Int(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_object(&self) -> Option<ObjRef> {
        match *self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::RawPtr(_) => "ptr",
            Value::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) => a as f64 == b,
            (Value::Float(a), Value::Int(b)) => a == b as f64,
            (Value::RawPtr(a), Value::RawPtr(b)) => std::ptr::eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<ObjRef> for Value {
    fn from(value: ObjRef) -> Self {
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(Value::Nil.is_falsey());
        assert!(Value::Bool(false).is_falsey());
        assert!(!Value::Bool(true).is_falsey());
        assert!(!Value::Int(0).is_falsey());
        assert!(!Value::Float(0.0).is_falsey());
        assert!(!Value::Object(ObjRef::new(0, 0)).is_falsey());
    }

    #[test]
    fn numeric_equality_crosses_variants() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(3.0), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn mismatched_variants_never_equal() {
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Int(0), Value::Bool(false));
        assert_ne!(Value::Int(1), Value::Object(ObjRef::new(1, 0)));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = ObjRef::new(4, 1);
        assert_eq!(Value::Object(a), Value::Object(ObjRef::new(4, 1)));
        assert_ne!(Value::Object(a), Value::Object(ObjRef::new(4, 2)));
    }

    #[test]
    fn raw_pointers_compare_by_address() {
        let mut x = 1u8;
        let p = &mut x as *mut u8 as *mut c_void;
        assert_eq!(Value::RawPtr(p), Value::RawPtr(p));
        assert_ne!(Value::RawPtr(p), Value::RawPtr(std::ptr::null_mut()));
    }
}
