mod activation;
mod arithmetic;
mod assembler;
pub mod demos;
mod error;
pub mod format;
mod heap;
mod interning;
mod interpreter;
mod object;
pub mod objects;
mod primitives;
mod stack;
mod upvalues;
mod value;
mod visitor;
mod vm;

pub use activation::{CallFrame, CallStack};
pub use arithmetic::BinaryOp;
pub use assembler::{ConstantPoolFull, FunctionBuilder, MAX_CONSTANTS};
pub use error::{
    CompileError, ConfigError, InterpretError, RuntimeError, RuntimeFault, TraceFrame,
};
pub use heap::{GarbageCollectionStats, Heap, HeapSettings, NoRoots, RootProvider};
pub use interning::InternedStrings;
pub use object::*;
pub use objects::*;
pub use primitives::{PRIMITIVES, Primitive, PrimitiveFunction};
pub use stack::Stack;
pub use value::{ObjRef, Value};
pub use visitor::{Visitable, Visitor};
pub use vm::*;

pub use bytecode;
