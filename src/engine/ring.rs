use alloc::{boxed::Box, vec};

/// Fixed-capacity circular buffer. Storage is allocated once in `new`; pushes
/// past capacity overwrite the oldest sample.
///
/// Samples are addressed by position from the oldest, or in runs by absolute
/// stream index (the count of pushes before the sample), which stays valid
/// across wrap-around until the sample is overwritten.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    slots: Box<[T]>,
    head: usize,
    len: usize,
    pushed: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
            pushed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of samples ever pushed since construction or `clear`.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn clear(&mut self) {
        self.slots.fill(T::default());
        self.head = 0;
        self.len = 0;
        self.pushed = 0;
    }

    pub fn push(&mut self, value: T) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
        self.pushed += 1;
    }

    fn get_by_age(&self, age: usize) -> Option<T> {
        if age >= self.len {
            return None;
        }
        let cap = self.slots.len();
        Some(self.slots[(self.head + cap - 1 - age) % cap])
    }

    /// `i`-th retained sample counting from the oldest.
    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.len {
            return None;
        }
        self.get_by_age(self.len - 1 - i)
    }

    /// Stream index of the oldest retained sample, if any.
    fn oldest_index(&self) -> Option<u64> {
        (self.len > 0).then(|| self.pushed - self.len as u64)
    }

    /// Copies `out.len()` consecutive samples starting at stream index `first`.
    /// Returns `false` and leaves `out` untouched when any of them has not
    /// arrived yet or has already been overwritten.
    pub fn copy_range(&self, first: u64, out: &mut [T]) -> bool {
        let Some(oldest) = self.oldest_index() else {
            return out.is_empty();
        };
        let last_exclusive = first + out.len() as u64;
        if first < oldest || last_exclusive > self.pushed {
            return false;
        }
        let cap = self.slots.len();
        let start_slot = (self.head + cap - self.len + (first - oldest) as usize) % cap;
        for (k, dst) in out.iter_mut().enumerate() {
            *dst = self.slots[(start_slot + k) % cap];
        }
        true
    }
}
