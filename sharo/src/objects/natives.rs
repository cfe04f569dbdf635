use std::fmt;
use std::rc::Rc;

use crate::{Mutator, Value, Visitable, Visitor};

/// Host callback behind a native function. Receives the call's arguments
/// and an allocation scope; arity is the callee's business.
pub type NativeFn = Rc<dyn Fn(&mut Mutator<'_>, &[Value]) -> Value>;

pub struct Native {
    name: Rc<str>,
    function: NativeFn,
}

impl Native {
    pub fn new(name: impl Into<Rc<str>>, function: NativeFn) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &NativeFn {
        &self.function
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Visitable for Native {
    fn visit_edges(&self, _visitor: &mut impl Visitor) {}
}
