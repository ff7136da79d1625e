//! Fixed-size batching
//!
//! Holds a single open batch. A batch is handed out exactly once, either when
//! it reaches capacity or when the stream ends.

/// Upper bound on slots reserved up front; larger batches grow on demand
const MAX_PREALLOCATED: usize = 4096;

/// Accumulates items into batches of `capacity`
#[derive(Debug)]
pub struct Batcher<T> {
    capacity: usize,
    open: Vec<T>,
}

impl<T> Batcher<T> {
    /// Create a batcher; a capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            open: Vec::with_capacity(capacity.min(MAX_PREALLOCATED)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items waiting in the open batch
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Append an item, returning the batch if it is now full
    ///
    /// The returned batch is replaced by a fresh empty one.
    #[must_use = "a full batch must be flushed"]
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.open.push(item);

        if self.open.len() >= self.capacity {
            Some(self.take())
        } else {
            None
        }
    }

    /// The remaining partial batch at end of stream, if any
    pub fn finish(&mut self) -> Option<Vec<T>> {
        if self.open.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<T> {
        let fresh = Vec::with_capacity(self.capacity.min(MAX_PREALLOCATED));
        std::mem::replace(&mut self.open, fresh)
    }
}
