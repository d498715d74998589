//! Evicts the last-level cache between benchmark repetitions.

use std::hint::black_box;

use crate::spec::DEFAULT_CACHE_SIZE;

/// Three `f64` buffers of `cache_size / 8` elements each; streaming through
/// them pushes any stencil data out of a cache of `cache_size` bytes.
#[derive(Clone, Debug)]
pub struct CacheFlusher {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl CacheFlusher {
    /// Flusher for a last-level cache of `cache_size` bytes.
    pub fn new(cache_size: usize) -> Self {
        let n = (cache_size / 8).max(1);
        Self {
            a: vec![0.0; n],
            b: vec![1.0; n],
            c: vec![2.0; n],
        }
    }

    /// Elements per buffer.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Stream `a = b * c` over the buffers.
    pub fn flush(&mut self) {
        for ((a, b), c) in self.a.iter_mut().zip(&self.b).zip(&self.c) {
            *a = b * c;
        }
        black_box(&self.a);
    }
}

impl Default for CacheFlusher {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size() {
        assert_eq!(CacheFlusher::default().len(), 1 << 20);
        assert_eq!(CacheFlusher::new(64).len(), 8);
        assert_eq!(CacheFlusher::new(3).len(), 1);
    }

    #[test]
    fn test_flush_writes_product() {
        let mut flusher = CacheFlusher::new(64);
        flusher.flush();
        assert!(flusher.a.iter().all(|&v| v == 2.0));
    }
}
