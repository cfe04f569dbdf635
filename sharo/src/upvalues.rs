use crate::{ObjRef, Object, RuntimeError, Upvalue, UpvalueState, VM, Value};

const NOT_AN_UPVALUE: RuntimeError = RuntimeError::Malformed("expected an upvalue");

impl VM {
    #[inline]
    pub(crate) fn upvalue(&self, object: ObjRef) -> Result<&Upvalue, RuntimeError> {
        self.heap
            .try_get(object)
            .and_then(Object::as_upvalue)
            .ok_or(NOT_AN_UPVALUE)
    }

    #[inline]
    fn upvalue_mut(&mut self, object: ObjRef) -> Result<&mut Upvalue, RuntimeError> {
        match self.heap.try_get(object) {
            Some(Object::Upvalue(_)) => {}
            _ => return Err(NOT_AN_UPVALUE),
        }
        self.heap.get_mut(object).as_upvalue_mut().ok_or(NOT_AN_UPVALUE)
    }

    /// The cell for stack `slot`, shared with every closure that already
    /// captured it.
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> Result<ObjRef, RuntimeError> {
        let mut prev = None;
        let mut current = self.roots.open_upvalues;
        while let Some(object) = current {
            let upvalue = self.upvalue(object)?;
            match upvalue.open_slot() {
                Some(open) if open > slot => {
                    prev = current;
                    current = upvalue.next;
                }
                Some(open) if open == slot => return Ok(object),
                _ => break,
            }
        }

        // prev and current stay reachable through the chain head
        let created = self.allocate(Object::Upvalue(Upvalue::open(slot, current)));
        match prev {
            None => self.roots.open_upvalues = Some(created),
            Some(prev) => self.upvalue_mut(prev)?.next = Some(created),
        }
        Ok(created)
    }

    /// Close every open upvalue at or above stack slot `last`.
    pub(crate) fn close_upvalues(&mut self, last: usize) -> Result<(), RuntimeError> {
        while let Some(head) = self.roots.open_upvalues {
            let upvalue = self.upvalue(head)?;
            let Some(slot) = upvalue.open_slot() else {
                return Err(RuntimeError::Malformed("closed upvalue in open chain"));
            };
            if slot < last {
                break;
            }
            let next = upvalue.next;
            let value = self.roots.stack.get(slot)?;
            self.upvalue_mut(head)?.close(value);
            self.roots.open_upvalues = next;
        }
        Ok(())
    }

    pub(crate) fn read_upvalue(&self, object: ObjRef) -> Result<Value, RuntimeError> {
        match self.upvalue(object)?.state() {
            UpvalueState::Open(slot) => self.roots.stack.get(slot),
            UpvalueState::Closed(value) => Ok(value),
        }
    }

    pub(crate) fn write_upvalue(&mut self, object: ObjRef, value: Value) -> Result<(), RuntimeError> {
        match self.upvalue(object)?.state() {
            UpvalueState::Open(slot) => self.roots.stack.set(slot, value),
            UpvalueState::Closed(_) => {
                self.upvalue_mut(object)?.set_closed(value);
                Ok(())
            }
        }
    }

    /// Open upvalue slots from the chain head down.
    #[cfg(test)]
    pub(crate) fn open_upvalue_slots(&self) -> Vec<usize> {
        let mut slots = Vec::new();
        let mut current = self.roots.open_upvalues;
        while let Some(object) = current {
            let Ok(upvalue) = self.upvalue(object) else {
                break;
            };
            slots.extend(upvalue.open_slot());
            current = upvalue.next;
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::tests::test_vm;
    use crate::{UpvalueState, Value};

    fn with_stack(values: &[Value]) -> crate::VM {
        let mut vm = test_vm();
        for value in values {
            vm.roots.stack.push(*value).unwrap();
        }
        vm
    }

    #[test]
    fn capture_reuses_cells_and_keeps_order() {
        let mut vm = with_stack(&[Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)]);
        let a = vm.capture_upvalue(1).unwrap();
        let b = vm.capture_upvalue(3).unwrap();
        let c = vm.capture_upvalue(2).unwrap();

        assert_eq!(vm.capture_upvalue(1).unwrap(), a);
        assert_eq!(vm.capture_upvalue(3).unwrap(), b);
        assert_ne!(a, c);
        assert_eq!(vm.open_upvalue_slots(), [3, 2, 1]);
    }

    #[test]
    fn open_cells_alias_the_stack() {
        let mut vm = with_stack(&[Value::Nil, Value::Int(5)]);
        let cell = vm.capture_upvalue(1).unwrap();
        vm.write_upvalue(cell, Value::Int(6)).unwrap();
        assert_eq!(vm.roots.stack.get(1).unwrap(), Value::Int(6));

        vm.roots.stack.set(1, Value::Int(7)).unwrap();
        assert_eq!(vm.read_upvalue(cell).unwrap(), Value::Int(7));
    }

    #[test]
    fn closing_copies_values_out() {
        let mut vm = with_stack(&[Value::Int(10), Value::Int(11), Value::Int(12)]);
        let low = vm.capture_upvalue(0).unwrap();
        let high = vm.capture_upvalue(2).unwrap();

        vm.close_upvalues(1).unwrap();
        assert_eq!(vm.open_upvalue_slots(), [0]);
        assert_eq!(
            vm.upvalue(high).unwrap().state(),
            UpvalueState::Closed(Value::Int(12))
        );
        assert!(vm.upvalue(low).unwrap().is_open());

        vm.roots.stack.truncate(1);
        vm.write_upvalue(high, Value::Int(99)).unwrap();
        assert_eq!(vm.read_upvalue(high).unwrap(), Value::Int(99));
    }

    #[test]
    fn open_upvalues_survive_collection() {
        let mut vm = with_stack(&[Value::Int(1), Value::Int(2)]);
        let a = vm.capture_upvalue(0).unwrap();
        let b = vm.capture_upvalue(1).unwrap();
        vm.collect_garbage();
        assert!(vm.heap().is_live(a));
        assert!(vm.heap().is_live(b));
    }
}
