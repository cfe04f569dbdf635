use crate::{Value, Visitable, Visitor};

#[derive(Debug, Clone, Default)]
pub struct Array {
    pub elements: Vec<Value>,
}

impl Array {
    pub fn new(elements: Vec<Value>) -> Self {
        Self { elements }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Position of `index` if it lies in `[0, len)`.
    #[inline]
    pub fn checked_index(&self, index: i64) -> Option<usize> {
        usize::try_from(index).ok().filter(|&i| i < self.elements.len())
    }
}

impl Visitable for Array {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        for element in &self.elements {
            visitor.visit_value(*element);
        }
    }
}
