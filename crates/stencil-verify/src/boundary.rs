//! Boundary extents: per-axis indentation of the compared region.

use std::fmt;
use std::ops::Range;

use stencil_core::Halo;

/// Six non-negative widths cut off the low (`minus`) and high (`plus`) end
/// of each axis before comparison. The default compares the full field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundaryExtent {
    i_minus: usize,
    i_plus: usize,
    j_minus: usize,
    j_plus: usize,
    k_minus: usize,
    k_plus: usize,
}

impl BoundaryExtent {
    pub const fn new(
        i_minus: usize,
        i_plus: usize,
        j_minus: usize,
        j_plus: usize,
        k_minus: usize,
        k_plus: usize,
    ) -> Self {
        Self {
            i_minus,
            i_plus,
            j_minus,
            j_plus,
            k_minus,
            k_plus,
        }
    }

    /// Exclude exactly the horizontal halo.
    pub const fn from_halo(halo: Halo) -> Self {
        Self::new(halo.i_minus, halo.i_plus, halo.j_minus, halo.j_plus, 0, 0)
    }

    pub fn i_minus(&self) -> usize {
        self.i_minus
    }

    pub fn i_plus(&self) -> usize {
        self.i_plus
    }

    pub fn j_minus(&self) -> usize {
        self.j_minus
    }

    pub fn j_plus(&self) -> usize {
        self.j_plus
    }

    pub fn k_minus(&self) -> usize {
        self.k_minus
    }

    pub fn k_plus(&self) -> usize {
        self.k_plus
    }

    /// Compared i indices of an axis of `size` elements. Empty if the
    /// indentation covers the whole axis.
    pub fn i_range(&self, size: usize) -> Range<usize> {
        narrow(size, self.i_minus, self.i_plus)
    }

    pub fn j_range(&self, size: usize) -> Range<usize> {
        narrow(size, self.j_minus, self.j_plus)
    }

    pub fn k_range(&self, size: usize) -> Range<usize> {
        narrow(size, self.k_minus, self.k_plus)
    }
}

fn narrow(size: usize, minus: usize, plus: usize) -> Range<usize> {
    let end = size.saturating_sub(plus);
    minus.min(end)..end
}

impl fmt::Display for BoundaryExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i: [{}, {}], j: [{}, {}], k: [{}, {}]",
            self.i_minus, self.i_plus, self.j_minus, self.j_plus, self.k_minus, self.k_plus
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_range() {
        let b = BoundaryExtent::default();
        assert_eq!(b.i_range(10), 0..10);
        assert_eq!(b.k_range(1), 0..1);
    }

    #[test]
    fn test_narrowing() {
        let b = BoundaryExtent::new(1, 2, 3, 0, 0, 1);
        assert_eq!(b.i_range(10), 1..8);
        assert_eq!(b.j_range(10), 3..10);
        assert_eq!(b.k_range(5), 0..4);
    }

    #[test]
    fn test_over_indented_axis_is_empty() {
        let b = BoundaryExtent::new(4, 4, 0, 0, 0, 0);
        assert!(b.i_range(6).is_empty());
        assert!(b.i_range(3).is_empty());
    }

    #[test]
    fn test_from_halo() {
        let b = BoundaryExtent::from_halo(Halo::uniform(3));
        assert_eq!(b, BoundaryExtent::new(3, 3, 3, 3, 0, 0));
    }
}
