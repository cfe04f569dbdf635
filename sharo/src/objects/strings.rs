use std::borrow::Cow;
use std::rc::Rc;
use std::str;

use crate::{Visitable, Visitor};

/// An immutable, interned byte string.
///
/// The buffer is shared with the intern table key, so interning a string
/// stores its bytes once.
#[derive(Debug, Clone)]
pub struct VMString {
    bytes: Rc<[u8]>,
}

impl VMString {
    pub(crate) fn new(bytes: Rc<[u8]>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_utf8(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.bytes)
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl Visitable for VMString {
    fn visit_edges(&self, _visitor: &mut impl Visitor) {}
}
