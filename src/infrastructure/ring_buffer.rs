//! Ring buffer for bounded price history
//!
//! Stores a fixed number of elements, evicting the oldest on overflow.
//! Zero allocation after initialization. Iteration is chronological
//! (oldest first).

use std::fmt::Debug;

/// Ring buffer with fixed capacity
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    buffer: [T; N],
    /// Next write position
    head: usize,
    count: usize,
}

impl<T: Copy + Default + Debug, const N: usize> RingBuffer<T, N> {
    /// Create new ring buffer
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            head: 0,
            count: 0,
        }
    }

    /// Add value to buffer, returning the evicted oldest value when full
    #[inline]
    pub fn push(&mut self, value: T) -> Option<T> {
        if N == 0 {
            return Some(value);
        }

        let evicted = if self.count == N {
            Some(self.buffer[self.head])
        } else {
            self.count += 1;
            None
        };

        self.buffer[self.head] = value;
        self.head = (self.head + 1) % N;
        evicted
    }

    /// Index of the oldest stored element
    #[inline(always)]
    fn tail(&self) -> usize {
        (self.head + N - self.count) % N.max(1)
    }

    /// Iterate values oldest-first
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        let tail = self.tail();
        (0..self.count).map(move |i| &self.buffer[(tail + i) % N])
    }

    /// Iterate the most recent `n` values, oldest-first
    #[inline]
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.count.saturating_sub(n);
        self.iter().skip(skip)
    }

    /// Most recently pushed value
    #[inline]
    pub fn last(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        Some(self.buffer[(self.head + N - 1) % N])
    }

    /// Copy contents into a Vec, oldest-first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }

    /// Get stored count
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<T: Copy + Default + Debug, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default + Debug, const N: usize> Extend<T> for RingBuffer<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T: Copy + Default + Debug, const N: usize> FromIterator<T> for RingBuffer<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut rb = Self::new();
        rb.extend(iter);
        rb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_push() {
        let mut rb = RingBuffer::<i32, 3>::new();
        assert_eq!(rb.push(1), None);
        assert_eq!(rb.push(2), None);
        assert_eq!(rb.push(3), None);
        assert_eq!(rb.len(), 3);

        assert_eq!(rb.push(4), Some(1)); // Evicts 1
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn test_iter_is_chronological_after_wrap() {
        let mut rb = RingBuffer::<i32, 4>::new();
        for v in 0..11 {
            rb.push(v);
        }
        assert_eq!(rb.to_vec(), vec![7, 8, 9, 10]);
        assert_eq!(rb.last(), Some(10));
        assert_eq!(rb.iter().rev().next(), Some(&10));
    }

    #[test]
    fn test_recent_window() {
        let rb: RingBuffer<f64, 30> = (1..=12).map(f64::from).collect();
        let recent: Vec<f64> = rb.recent(5).copied().collect();
        assert_eq!(recent, vec![8.0, 9.0, 10.0, 11.0, 12.0]);

        // Asking for more than stored returns everything
        assert_eq!(rb.recent(100).count(), 12);
    }

    #[test]
    fn test_empty_buffer() {
        let rb = RingBuffer::<f64, 30>::new();
        assert!(rb.is_empty());
        assert_eq!(rb.last(), None);
        assert_eq!(rb.iter().count(), 0);
    }
}
