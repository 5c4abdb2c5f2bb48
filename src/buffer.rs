use std::{fmt::Debug, mem::replace};

/// An amortized-growth array of fixed-layout records.
///
/// Storage is a boxed slice whose length is the capacity; `count` records at the front are live.
/// Growing swaps in a new slice and drops the old one in the same step, so the records are never
/// owned twice.
#[derive(Debug)]
pub struct GrowableBuffer<T> {
    count: usize,
    data: Box<[T]>,
}

impl<T: Copy + Default> GrowableBuffer<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            data: Box::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut buffer = Self::new();
        buffer.reserve(capacity);
        buffer
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Makes room for exactly `capacity` records. Does nothing if there already is enough.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.data.len() {
            return;
        }

        let mut data = vec![T::default(); capacity].into_boxed_slice();
        data[..self.count].copy_from_slice(&self.data[..self.count]);
        drop(replace(&mut self.data, data));
    }

    /// Claims `n` records at the end of the buffer and returns them reset to their default.
    /// Capacity doubles (or jumps straight to the required size) when the claim does not fit.
    pub fn allocate_n(&mut self, n: usize) -> &mut [T] {
        let required = self.count + n;
        if required > self.capacity() {
            self.reserve((self.capacity() * 2).max(required));
        }

        let claimed = &mut self.data[self.count..required];
        claimed.fill(T::default());
        self.count = required;
        claimed
    }

    pub fn push(&mut self, record: T) -> &mut T {
        let slot = &mut self.allocate_n(1)[0];
        *slot = record;
        slot
    }

    /// Forgets every record but keeps the storage for reuse.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.count]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.count]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T: Copy + Default> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
