use std::rc::Rc;

use crate::{ObjRef, RuntimeError};

/// One active call.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub closure: ObjRef,
    /// The closure's function, cached.
    pub function: ObjRef,
    /// Offset of the next instruction in `code`.
    pub ip: usize,
    /// Stack index of slot 0 (the callee).
    pub base: usize,
    pub code: Rc<[u8]>,
}

/// Bounded stack of [`CallFrame`]s.
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_frames: usize,
}

impl CallStack {
    pub fn new(max_frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(max_frames),
            max_frames,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Whether another frame fits.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.frames.len() < self.max_frames
    }

    pub fn push(&mut self, frame: CallFrame) -> Result<(), RuntimeError> {
        if !self.has_room() {
            return Err(RuntimeError::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    #[inline]
    pub fn current(&self) -> Result<&CallFrame, RuntimeError> {
        self.frames
            .last()
            .ok_or(RuntimeError::Malformed("no active frame"))
    }

    #[inline]
    pub fn current_mut(&mut self) -> Result<&mut CallFrame, RuntimeError> {
        self.frames
            .last_mut()
            .ok_or(RuntimeError::Malformed("no active frame"))
    }

    /// Innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &CallFrame> {
        self.frames.iter().rev()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(base: usize) -> CallFrame {
        CallFrame {
            closure: ObjRef::new(0, 0),
            function: ObjRef::new(1, 0),
            ip: 0,
            base,
            code: Rc::from(&[][..]),
        }
    }

    #[test]
    fn bounded() {
        let mut frames = CallStack::new(2);
        frames.push(frame(0)).unwrap();
        frames.push(frame(1)).unwrap();
        assert!(!frames.has_room());
        assert_eq!(frames.push(frame(2)).unwrap_err(), RuntimeError::StackOverflow);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn iterates_innermost_first() {
        let mut frames = CallStack::new(4);
        frames.push(frame(0)).unwrap();
        frames.push(frame(5)).unwrap();
        let bases: Vec<_> = frames.iter().map(|f| f.base).collect();
        assert_eq!(bases, [5, 0]);
        assert_eq!(frames.current().unwrap().base, 5);
        frames.clear();
        assert!(frames.current().is_err());
    }
}
