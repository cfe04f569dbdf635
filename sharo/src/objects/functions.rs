use std::mem;
use std::rc::Rc;

use bytecode::LineTable;

use crate::{ObjRef, Value, Visitable, Visitor};

/// Bytecode, line table and constant pool of one function.
///
/// The code is reference counted so the interpreter can hold on to the
/// bytes of the running frame without borrowing the heap.
#[derive(Debug, Clone)]
pub struct Chunk {
    code: Rc<[u8]>,
    lines: LineTable,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new(code: Vec<u8>, lines: LineTable, constants: Vec<Value>) -> Self {
        Self {
            code: code.into(),
            lines,
            constants,
        }
    }

    #[inline]
    pub fn code(&self) -> &Rc<[u8]> {
        &self.code
    }

    #[inline]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    #[inline]
    pub fn constant(&self, idx: u16) -> Option<Value> {
        self.constants.get(idx as usize).copied()
    }

    pub fn line_for(&self, pc: usize) -> Option<u32> {
        self.lines.line_for(pc)
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.code.len()
            + self.lines.encoded_len()
            + self.constants.capacity() * mem::size_of::<Value>()
    }
}

/// A function prototype. Closures share it, it never changes after
/// allocation.
#[derive(Debug, Clone)]
pub struct Function {
    /// `None` for a top-level script.
    pub name: Option<ObjRef>,
    pub arity: u8,
    pub upvalue_count: u8,
    pub chunk: Chunk,
}

impl Visitable for Function {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let Some(name) = self.name {
            visitor.visit(name);
        }
        for constant in self.chunk.constants() {
            visitor.visit_value(*constant);
        }
    }
}
