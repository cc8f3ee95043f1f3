/// LIFO of code positions, used to pair `[` with `]` as they are discovered.
#[derive(Debug, Default, Clone)]
pub struct PositionStack {
    items: Vec<usize>,
}

impl PositionStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn push(&mut self, position: usize) {
        self.items.push(position);
    }

    /// Pop the most recent position, or `None` on underflow.
    #[inline(always)]
    pub fn pop(&mut self) -> Option<usize> {
        self.items.pop()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
