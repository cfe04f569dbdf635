use std::mem;

use crate::{
    Array, BoundMethod, Closure, Function, Instance, Native, ObjRef, StructDef, Upvalue, VMString,
    Visitable, Visitor,
};

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    String,
    Function,
    Upvalue,
    Closure,
    Native,
    Array,
    StructDef,
    Struct,
    BoundMethod,
}

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::String => "string",
            ObjectType::Function => "function",
            ObjectType::Upvalue => "upvalue",
            ObjectType::Closure => "closure",
            ObjectType::Native => "native",
            ObjectType::Array => "array",
            ObjectType::StructDef => "struct definition",
            ObjectType::Struct => "struct",
            ObjectType::BoundMethod => "bound method",
        }
    }
}

/// Per-object GC metadata. `size` is the byte count charged to the
/// allocation counter and refunded when the object is swept.
#[derive(Debug, Copy, Clone)]
pub struct Header {
    object_type: ObjectType,
    marked: bool,
    size: usize,
}

impl Header {
    pub fn new(object_type: ObjectType, size: usize) -> Self {
        Self {
            object_type,
            marked: false,
            size,
        }
    }

    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    #[inline]
    pub fn mark(&mut self) {
        self.marked = true;
    }

    #[inline]
    pub fn unmark(&mut self) {
        self.marked = false;
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}

#[derive(Debug)]
pub enum Object {
    String(VMString),
    Function(Function),
    Upvalue(Upvalue),
    Closure(Closure),
    Native(Native),
    Array(Array),
    StructDef(StructDef),
    Struct(Instance),
    BoundMethod(BoundMethod),
}

macro_rules! object_accessors {
    ($($variant:ident => $ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        impl Object {
            $(
                #[inline]
                pub fn $as_ref(&self) -> Option<&$ty> {
                    match self {
                        Object::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                #[inline]
                pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                    match self {
                        Object::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }
    };
}

object_accessors! {
    String => VMString, as_string, as_string_mut;
    Function => Function, as_function, as_function_mut;
    Upvalue => Upvalue, as_upvalue, as_upvalue_mut;
    Closure => Closure, as_closure, as_closure_mut;
    Native => Native, as_native, as_native_mut;
    Array => Array, as_array, as_array_mut;
    StructDef => StructDef, as_struct_def, as_struct_def_mut;
    Struct => Instance, as_instance, as_instance_mut;
    BoundMethod => BoundMethod, as_bound_method, as_bound_method_mut;
}

impl Object {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::String(_) => ObjectType::String,
            Object::Function(_) => ObjectType::Function,
            Object::Upvalue(_) => ObjectType::Upvalue,
            Object::Closure(_) => ObjectType::Closure,
            Object::Native(_) => ObjectType::Native,
            Object::Array(_) => ObjectType::Array,
            Object::StructDef(_) => ObjectType::StructDef,
            Object::Struct(_) => ObjectType::Struct,
            Object::BoundMethod(_) => ObjectType::BoundMethod,
        }
    }

    /// Bytes this object accounts for: the slot itself plus owned buffers.
    pub fn allocation_size(&self) -> usize {
        let owned = match self {
            Object::String(s) => s.len(),
            Object::Function(f) => f.chunk.heap_size(),
            Object::Closure(c) => c.upvalues.len() * mem::size_of::<ObjRef>(),
            Object::Array(a) => a.elements.capacity() * mem::size_of::<crate::Value>(),
            Object::StructDef(d) => d.heap_size(),
            Object::Struct(i) => i.fields().len() * mem::size_of::<crate::Value>(),
            Object::Upvalue(_) | Object::Native(_) | Object::BoundMethod(_) => 0,
        };
        mem::size_of::<Header>() + mem::size_of::<Object>() + owned
    }
}

// dispatch to the concrete object, which visits its own edges.
impl Visitable for Object {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        match self {
            Object::String(s) => s.visit_edges(visitor),
            Object::Function(f) => f.visit_edges(visitor),
            Object::Upvalue(u) => u.visit_edges(visitor),
            Object::Closure(c) => c.visit_edges(visitor),
            Object::Native(n) => n.visit_edges(visitor),
            Object::Array(a) => a.visit_edges(visitor),
            Object::StructDef(d) => d.visit_edges(visitor),
            Object::Struct(i) => i.visit_edges(visitor),
            Object::BoundMethod(b) => b.visit_edges(visitor),
        }
    }
}
