use crate::{ObjRef, Value, Visitable, Visitor};

/// Where an upvalue's variable currently lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpvalueState {
    /// Still on the operand stack, at this absolute slot.
    Open(usize),
    /// Moved off the stack when its scope ended.
    Closed(Value),
}

/// A captured variable, shared by every closure that captured the same slot.
///
/// Open upvalues form a chain through `next`, sorted by descending slot,
/// headed by the VM.
#[derive(Debug, Clone)]
pub struct Upvalue {
    state: UpvalueState,
    pub(crate) next: Option<ObjRef>,
}

impl Upvalue {
    pub fn open(slot: usize, next: Option<ObjRef>) -> Self {
        Self {
            state: UpvalueState::Open(slot),
            next,
        }
    }

    #[inline]
    pub fn state(&self) -> UpvalueState {
        self.state
    }

    #[inline]
    pub fn open_slot(&self) -> Option<usize> {
        match self.state {
            UpvalueState::Open(slot) => Some(slot),
            UpvalueState::Closed(_) => None,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open_slot().is_some()
    }

    /// Take ownership of `value` and leave the open chain.
    pub fn close(&mut self, value: Value) {
        self.state = UpvalueState::Closed(value);
        self.next = None;
    }

    /// Overwrite a closed upvalue's value.
    pub(crate) fn set_closed(&mut self, value: Value) {
        debug_assert!(!self.is_open());
        self.state = UpvalueState::Closed(value);
    }
}

impl Visitable for Upvalue {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let UpvalueState::Closed(value) = self.state {
            visitor.visit_value(value);
        }
        if let Some(next) = self.next {
            visitor.visit(next);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub function: ObjRef,
    pub upvalues: Box<[ObjRef]>,
}

impl Visitable for Closure {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        visitor.visit(self.function);
        for upvalue in self.upvalues.iter() {
            visitor.visit(*upvalue);
        }
    }
}
