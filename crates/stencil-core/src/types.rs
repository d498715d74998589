//! Core type definitions: ScalarKind, Element, Extents, Strides, StorageMeta.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::serialization::{ScalarSlice, ScalarSliceMut};

/// Scalar types a field can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    F32,
    F64,
}

impl ScalarKind {
    /// Size in bytes of a single element.
    pub fn size_bytes(self) -> usize {
        match self {
            ScalarKind::F32 => 4,
            ScalarKind::F64 => 8,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::F32 => write!(f, "f32"),
            ScalarKind::F64 => write!(f, "f64"),
        }
    }
}

/// Floating-point element stored in a field.
///
/// Implemented for `f32` and `f64`. The associated [`ScalarKind`] is what the
/// serializer compares against when loading data into a field.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Send
    + Sync
    + 'static
{
    const KIND: ScalarKind;

    fn abs(self) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;

    /// Tag a slice of this element type for the serializer interface.
    fn tag_slice(data: &[Self]) -> ScalarSlice<'_>;
    fn tag_slice_mut(data: &mut [Self]) -> ScalarSliceMut<'_>;
}

impl Element for f32 {
    const KIND: ScalarKind = ScalarKind::F32;

    fn abs(self) -> Self {
        f32::abs(self)
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn tag_slice(data: &[Self]) -> ScalarSlice<'_> {
        ScalarSlice::F32(data)
    }

    fn tag_slice_mut(data: &mut [Self]) -> ScalarSliceMut<'_> {
        ScalarSliceMut::F32(data)
    }
}

impl Element for f64 {
    const KIND: ScalarKind = ScalarKind::F64;

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(v: f64) -> Self {
        v
    }

    fn tag_slice(data: &[Self]) -> ScalarSlice<'_> {
        ScalarSlice::F64(data)
    }

    fn tag_slice_mut(data: &mut [Self]) -> ScalarSliceMut<'_> {
        ScalarSliceMut::F64(data)
    }
}

/// Size of a field along i, j and k.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extents {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Extents {
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.i * self.j * self.k
    }

    pub fn to_array(self) -> [usize; 3] {
        [self.i, self.j, self.k]
    }
}

impl From<[usize; 3]> for Extents {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}

impl fmt::Display for Extents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// Element strides along i, j and k (in elements, not bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Strides {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Strides {
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    /// Linear offset of `(i, j, k)`.
    #[inline]
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        i * self.i + j * self.j + k * self.k
    }
}

/// Halo widths in the horizontal plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Halo {
    pub i_minus: usize,
    pub i_plus: usize,
    pub j_minus: usize,
    pub j_plus: usize,
}

impl Halo {
    /// Same width on all four sides.
    pub const fn uniform(width: usize) -> Self {
        Self {
            i_minus: width,
            i_plus: width,
            j_minus: width,
            j_plus: width,
        }
    }
}

/// Memory order of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Layout {
    /// k is the unit-stride axis (`i` outermost).
    #[default]
    KFastest,
    /// i is the unit-stride axis (`k` outermost).
    IFastest,
}

/// Shape, halo and layout of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageMeta {
    extents: Extents,
    halo: Halo,
    layout: Layout,
}

impl StorageMeta {
    /// Meta data for a field of the given full extents (halo included), no halo
    /// bookkeeping and the default layout.
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self {
            extents: Extents::new(i, j, k),
            halo: Halo::default(),
            layout: Layout::default(),
        }
    }

    /// Meta data for a compute domain of `domain` interior points surrounded by `halo`.
    pub fn with_halo(domain: Extents, halo: Halo) -> Self {
        Self {
            extents: Extents::new(
                domain.i + halo.i_minus + halo.i_plus,
                domain.j + halo.j_minus + halo.j_plus,
                domain.k,
            ),
            halo,
            layout: Layout::default(),
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Full extents, halo included.
    pub fn extents(&self) -> Extents {
        self.extents
    }

    /// Extents without the halo.
    pub fn interior(&self) -> Extents {
        Extents::new(
            self.extents.i - self.halo.i_minus - self.halo.i_plus,
            self.extents.j - self.halo.j_minus - self.halo.j_plus,
            self.extents.k,
        )
    }

    pub fn halo(&self) -> Halo {
        self.halo
    }

    pub fn memory_layout(&self) -> Layout {
        self.layout
    }

    pub fn numel(&self) -> usize {
        self.extents.numel()
    }

    pub fn strides(&self) -> Strides {
        let Extents { i, j, k } = self.extents;
        match self.layout {
            Layout::KFastest => Strides::new(j * k, k, 1),
            Layout::IFastest => Strides::new(1, i, i * j),
        }
    }

    #[inline]
    pub fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(
            i < self.extents.i && j < self.extents.j && k < self.extents.k,
            "index ({i}, {j}, {k}) out of bounds for {}",
            self.extents
        );
        self.strides().offset(i, j, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extents_numel() {
        assert_eq!(Extents::new(2, 3, 4).numel(), 24);
        assert_eq!(Extents::new(0, 5, 1).numel(), 0);
    }

    #[test]
    fn test_strides_by_layout() {
        let meta = StorageMeta::new(4, 3, 2);
        assert_eq!(meta.strides(), Strides::new(6, 2, 1));

        let meta = meta.layout(Layout::IFastest);
        assert_eq!(meta.strides(), Strides::new(1, 4, 12));
        assert_eq!(meta.offset(3, 2, 1), 3 + 8 + 12);
    }

    #[test]
    fn test_halo_extents() {
        let meta = StorageMeta::with_halo(Extents::new(10, 8, 5), Halo::uniform(3));
        assert_eq!(meta.extents(), Extents::new(16, 14, 5));
        assert_eq!(meta.interior(), Extents::new(10, 8, 5));
        assert_eq!(meta.numel(), 16 * 14 * 5);
    }

    #[test]
    fn test_scalar_kind_size() {
        assert_eq!(ScalarKind::F32.size_bytes(), 4);
        assert_eq!(ScalarKind::F64.size_bytes(), 8);
        assert_eq!(f64::KIND.to_string(), "f64");
    }
}
