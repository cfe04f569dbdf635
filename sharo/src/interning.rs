use std::collections::HashMap;
use std::rc::Rc;

use ahash::RandomState;

use crate::ObjRef;

/// Byte content → canonical string object.
///
/// The table is weak: it is not a GC root. The heap removes the entry of
/// every string it sweeps, so a lookup never returns a dead handle.
pub struct InternedStrings {
    table: HashMap<Rc<[u8]>, ObjRef, RandomState>,
}

impl InternedStrings {
    pub fn new() -> Self {
        Self {
            table: HashMap::default(),
        }
    }

    #[inline]
    pub fn get(&self, bytes: &[u8]) -> Option<ObjRef> {
        self.table.get(bytes).copied()
    }

    pub fn insert(&mut self, bytes: Rc<[u8]>, string: ObjRef) {
        self.table.insert(bytes, string);
    }

    /// Drop the entry for `bytes` if it still maps to `string`.
    pub fn prune(&mut self, bytes: &[u8], string: ObjRef) -> bool {
        match self.table.get(bytes) {
            Some(&current) if current == string => {
                self.table.remove(bytes);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for InternedStrings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_content() {
        let mut strings = InternedStrings::new();
        let r = ObjRef::new(3, 0);
        strings.insert(Rc::from(&b"hello"[..]), r);

        assert_eq!(strings.get(b"hello"), Some(r));
        assert_eq!(strings.get(b"hell"), None);
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn prune_checks_identity() {
        let mut strings = InternedStrings::new();
        let r = ObjRef::new(3, 0);
        strings.insert(Rc::from(&b"x"[..]), r);

        assert!(!strings.prune(b"x", ObjRef::new(3, 1)));
        assert_eq!(strings.get(b"x"), Some(r));
        assert!(strings.prune(b"x", r));
        assert!(strings.is_empty());
    }
}
