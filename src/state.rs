use crate::error::ConfigError;

/// Fixed-capacity ring. Once full, the oldest element sits at `write`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    cap: usize,
    write: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(cap: usize) -> Result<Self, ConfigError> {
        if cap == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            data: Vec::with_capacity(cap),
            cap,
            write: 0,
        })
    }

    /// Pushes `value`, returning the element it displaced once the ring is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.data.len() < self.cap {
            self.data.push(value);
            return None;
        }
        let old = std::mem::replace(&mut self.data[self.write], value);
        self.write += 1;
        if self.write == self.cap {
            self.write = 0;
        }
        Some(old)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.len() == self.cap
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Element at chronological position `idx` (0 = oldest live element).
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&T> {
        let len = self.data.len();
        if idx >= len {
            return None;
        }
        let mut pos = self.write + idx;
        if pos >= len {
            pos -= len;
        }
        Some(&self.data[pos])
    }

    /// Oldest to newest.
    pub fn iter_chronological(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let (head, tail) = self.data.split_at(self.write);
        tail.iter().chain(head.iter())
    }
}
