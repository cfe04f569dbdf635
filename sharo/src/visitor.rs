use crate::{ObjRef, Value};

/// Something that walks the outgoing references of a heap object.
pub trait Visitable {
    fn visit_edges(&self, visitor: &mut impl Visitor);
}

pub trait Visitor {
    fn visit(&mut self, object: ObjRef);

    #[inline]
    fn visit_value(&mut self, value: Value) {
        if let Value::Object(object) = value {
            self.visit(object);
        }
    }
}

impl<F: FnMut(ObjRef)> Visitor for F {
    #[inline]
    fn visit(&mut self, object: ObjRef) {
        self(object)
    }
}
