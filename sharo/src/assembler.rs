//! Host-side construction of function prototypes.
//!
//! ```ignore
//! let function = vm.mutate(|m| -> Result<ObjRef, CompileError> {
//!     let mut f = FunctionBuilder::script();
//!     f.emit_constant(Value::Int(1))?;
//!     f.emit(Op::Print);
//!     f.emit(Op::Nil);
//!     f.emit(Op::Return);
//!     Ok(f.finish(m))
//! })?;
//! vm.run(function)?;
//! ```
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use ahash::RandomState;
use bytecode::BytecodeBuilder;

use crate::{Chunk, Function, Mutator, ObjRef, Object, Value};

/// Constant pool indices are 16-bit.
pub const MAX_CONSTANTS: usize = u16::MAX as usize + 1;

/// A constant that would need an index past [`MAX_CONSTANTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantPoolFull;

impl fmt::Display for ConstantPoolFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "more than {MAX_CONSTANTS} constants in one function")
    }
}

impl std::error::Error for ConstantPoolFull {}

/// Identity of a constant. Ints and floats never share an entry, floats
/// compare by bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstantKey {
    Nil,
    Bool(bool),
    Int(i64),
    Float(u64),
    RawPtr(usize),
    Object(ObjRef),
}

impl From<Value> for ConstantKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::Int(i),
            Value::Float(f) => Self::Float(f.to_bits()),
            Value::RawPtr(p) => Self::RawPtr(p as usize),
            Value::Object(object) => Self::Object(object),
        }
    }
}

/// A [`BytecodeBuilder`] plus the constant pool and signature of the
/// function being built. Derefs to the bytecode builder for emitting.
pub struct FunctionBuilder {
    code: BytecodeBuilder,
    constants: Vec<Value>,
    indices: HashMap<ConstantKey, u16, RandomState>,
    name: Option<ObjRef>,
    arity: u8,
    upvalue_count: u8,
}

impl FunctionBuilder {
    /// Top-level code: no name, no parameters.
    pub fn script() -> Self {
        Self::new(None, 0)
    }

    pub fn function(m: &mut Mutator<'_>, name: &str, arity: u8) -> Self {
        let name = m.intern(name);
        Self::new(Some(name), arity)
    }

    pub fn new(name: Option<ObjRef>, arity: u8) -> Self {
        Self {
            code: BytecodeBuilder::new(),
            constants: Vec::new(),
            indices: HashMap::default(),
            name,
            arity,
            upvalue_count: 0,
        }
    }

    pub fn with_upvalues(mut self, count: u8) -> Self {
        self.upvalue_count = count;
        self
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Index of `value` in the pool, adding it if no identical constant
    /// exists. A full pool is left unchanged.
    pub fn add_constant(&mut self, value: Value) -> Result<u16, ConstantPoolFull> {
        let key = ConstantKey::from(value);
        if let Some(index) = self.indices.get(&key) {
            return Ok(*index);
        }
        let index = u16::try_from(self.constants.len()).map_err(|_| ConstantPoolFull)?;
        self.constants.push(value);
        self.indices.insert(key, index);
        Ok(index)
    }

    /// Intern `name` and add it to the pool, for global, field, method and
    /// import operands.
    pub fn name_constant(
        &mut self,
        m: &mut Mutator<'_>,
        name: &str,
    ) -> Result<u16, ConstantPoolFull> {
        let name = m.intern(name);
        self.add_constant(Value::Object(name))
    }

    /// `Constant` instruction loading `value`.
    pub fn emit_constant(&mut self, value: Value) -> Result<(), ConstantPoolFull> {
        let index = self.add_constant(value)?;
        self.code.constant(index);
        Ok(())
    }

    /// Allocate the finished [`Function`]. The constant pool's objects must be
    /// rooted through `m` (or otherwise) until then.
    pub fn finish(self, m: &mut Mutator<'_>) -> ObjRef {
        let (code, lines) = self.code.finish();
        m.allocate(Object::Function(Function {
            name: self.name,
            arity: self.arity,
            upvalue_count: self.upvalue_count,
            chunk: Chunk::new(code, lines, self.constants),
        }))
    }
}

impl Deref for FunctionBuilder {
    type Target = BytecodeBuilder;

    fn deref(&self) -> &Self::Target {
        &self.code
    }
}

impl DerefMut for FunctionBuilder {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::tests::test_vm;

    #[test]
    fn constants_are_deduplicated_by_identity() {
        let mut f = FunctionBuilder::script();
        assert_eq!(f.add_constant(Value::Int(1)), Ok(0));
        assert_eq!(f.add_constant(Value::Float(1.0)), Ok(1));
        assert_eq!(f.add_constant(Value::Int(1)), Ok(0));
        assert_eq!(f.add_constant(Value::Float(f64::NAN)), Ok(2));
        assert_eq!(f.add_constant(Value::Float(f64::NAN)), Ok(2));
        assert_eq!(f.add_constant(Value::Float(-0.0)), Ok(3));
        assert_eq!(f.add_constant(Value::Float(0.0)), Ok(4));
        assert_eq!(f.constants().len(), 5);
    }

    #[test]
    fn full_pool_is_an_error() {
        let mut f = FunctionBuilder::script();
        for i in 0..MAX_CONSTANTS {
            assert_eq!(f.add_constant(Value::Int(i as i64)), Ok(i as u16));
        }
        assert_eq!(f.add_constant(Value::Int(-1)), Err(ConstantPoolFull));
        assert_eq!(f.emit_constant(Value::Nil), Err(ConstantPoolFull));
        assert_eq!(f.constants().len(), MAX_CONSTANTS);

        // existing entries still resolve
        assert_eq!(f.add_constant(Value::Int(7)), Ok(7));
        assert_eq!(f.emit_constant(Value::Int(65535)), Ok(()));
    }

    #[test]
    fn names_share_interned_constants() {
        let mut vm = test_vm();
        vm.mutate(|m| {
            let mut f = FunctionBuilder::script();
            let a = f.name_constant(m, "x").unwrap();
            let b = f.name_constant(m, "x").unwrap();
            let c = f.name_constant(m, "y").unwrap();
            assert_eq!(a, b);
            assert_ne!(a, c);
        });
    }

    #[test]
    fn finish_allocates_function() {
        let mut vm = test_vm();
        let function = vm.mutate(|m| {
            let mut f = FunctionBuilder::function(m, "add", 2).with_upvalues(1);
            f.get_local(1);
            f.get_local(2);
            f.emit(bytecode::Op::Add);
            f.emit(bytecode::Op::Return);
            f.finish(m)
        });
        let f = vm.heap().get(function).as_function().unwrap();
        assert_eq!(f.arity, 2);
        assert_eq!(f.upvalue_count, 1);
        assert_eq!(f.chunk.code().len(), 4);
        assert_eq!(vm.format_value(Value::Object(function)), "<fn add>");
    }
}
