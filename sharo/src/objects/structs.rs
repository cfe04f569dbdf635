use std::collections::HashMap;
use std::mem;

use ahash::RandomState;

use crate::{ObjRef, Value, Visitable, Visitor};

/// Definitions with more fields than this get a name→index map; smaller
/// ones are scanned linearly.
pub const FIELD_INDEX_THRESHOLD: usize = 8;

/// A struct type: ordered field names and a method table.
#[derive(Debug, Clone)]
pub struct StructDef {
    name: ObjRef,
    field_count: u8,
    field_names: Vec<ObjRef>,
    field_index: Option<HashMap<ObjRef, usize, RandomState>>,
    methods: HashMap<ObjRef, ObjRef, RandomState>,
}

impl StructDef {
    pub fn new(name: ObjRef, field_count: u8) -> Self {
        Self {
            name,
            field_count,
            field_names: Vec::with_capacity(field_count as usize),
            field_index: None,
            methods: HashMap::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> ObjRef {
        self.name
    }

    /// Declared number of fields, which is also the constructor arity.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.field_count as usize
    }

    pub fn field_names(&self) -> &[ObjRef] {
        &self.field_names
    }

    /// Append the next field name. Returns `false` once every declared
    /// field has a name.
    pub fn add_field(&mut self, name: ObjRef) -> bool {
        if self.field_names.len() >= self.field_count() {
            return false;
        }
        let slot = self.field_names.len();
        self.field_names.push(name);

        if let Some(index) = &mut self.field_index {
            index.entry(name).or_insert(slot);
        } else if self.field_names.len() > FIELD_INDEX_THRESHOLD {
            let mut index = HashMap::with_capacity_and_hasher(
                self.field_count(),
                RandomState::new(),
            );
            for (slot, name) in self.field_names.iter().enumerate() {
                index.entry(*name).or_insert(slot);
            }
            self.field_index = Some(index);
        }
        true
    }

    #[inline]
    pub fn field_slot(&self, name: ObjRef) -> Option<usize> {
        match &self.field_index {
            Some(index) => index.get(&name).copied(),
            None => self.field_names.iter().position(|&n| n == name),
        }
    }

    #[inline]
    pub fn uses_field_index(&self) -> bool {
        self.field_index.is_some()
    }

    #[inline]
    pub fn method(&self, name: ObjRef) -> Option<ObjRef> {
        self.methods.get(&name).copied()
    }

    pub fn define_method(&mut self, name: ObjRef, closure: ObjRef) {
        self.methods.insert(name, closure);
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub(crate) fn heap_size(&self) -> usize {
        let pair = mem::size_of::<ObjRef>() * 2;
        self.field_names.capacity() * mem::size_of::<ObjRef>()
            + self.methods.capacity() * pair
            + self
                .field_index
                .as_ref()
                .map_or(0, |index| index.capacity() * (mem::size_of::<ObjRef>() + mem::size_of::<usize>()))
    }
}

impl Visitable for StructDef {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit(self.name);
        for name in &self.field_names {
            visitor.visit(*name);
        }
        for (name, closure) in &self.methods {
            visitor.visit(*name);
            visitor.visit(*closure);
        }
    }
}

/// An instance of a [`StructDef`]. Field values are stored in declaration
/// order.
#[derive(Debug, Clone)]
pub struct Instance {
    def: ObjRef,
    fields: Box<[Value]>,
}

impl Instance {
    pub fn new(def: ObjRef, fields: Box<[Value]>) -> Self {
        Self { def, fields }
    }

    #[inline]
    pub fn def(&self) -> ObjRef {
        self.def
    }

    #[inline]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, slot: usize) -> Option<Value> {
        self.fields.get(slot).copied()
    }

    #[inline]
    pub fn set_field(&mut self, slot: usize, value: Value) -> bool {
        match self.fields.get_mut(slot) {
            Some(field) => {
                *field = value;
                true
            }
            None => false,
        }
    }
}

impl Visitable for Instance {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit(self.def);
        for field in self.fields.iter() {
            visitor.visit_value(*field);
        }
    }
}

/// A method closure paired with the receiver it was read from.
#[derive(Debug, Clone, Copy)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

impl Visitable for BoundMethod {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit_value(self.receiver);
        visitor.visit(self.method);
    }
}
