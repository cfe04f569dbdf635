use crate::{RuntimeError, Value};

const UNDERFLOW: RuntimeError = RuntimeError::Malformed("stack underflow");
const BAD_SLOT: RuntimeError = RuntimeError::Malformed("stack slot out of range");

/// The operand stack. Frame locals are windows into it.
///
/// Pushing past `limit` is a stack overflow, popping an empty stack means the
/// bytecode is malformed. Neither panics.
#[derive(Debug, Clone)]
pub struct Stack {
    values: Vec<Value>,
    limit: usize,
}

impl Stack {
    pub fn new(limit: usize) -> Self {
        Self {
            values: Vec::with_capacity(limit.min(4096)),
            limit,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.values.len() >= self.limit {
            return Err(RuntimeError::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(UNDERFLOW)
    }

    /// The value `distance` slots below the top.
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        let len = self.values.len();
        if distance >= len {
            return Err(UNDERFLOW);
        }
        Ok(self.values[len - 1 - distance])
    }

    /// Drop `count` values from the top.
    #[inline]
    pub fn drop_n(&mut self, count: usize) -> Result<(), RuntimeError> {
        let len = self.values.len();
        if count > len {
            return Err(UNDERFLOW);
        }
        self.values.truncate(len - count);
        Ok(())
    }

    /// The top `count` values, oldest first.
    #[inline]
    pub fn top(&self, count: usize) -> Result<&[Value], RuntimeError> {
        let len = self.values.len();
        if count > len {
            return Err(UNDERFLOW);
        }
        Ok(&self.values[len - count..])
    }

    #[inline]
    pub fn get(&self, slot: usize) -> Result<Value, RuntimeError> {
        self.values.get(slot).copied().ok_or(BAD_SLOT)
    }

    #[inline]
    pub fn set(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        let target = self.values.get_mut(slot).ok_or(BAD_SLOT)?;
        *target = value;
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
