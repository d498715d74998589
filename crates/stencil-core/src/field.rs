//! Field capability trait.
//!
//! A `Field` is whatever the grid library hands to a test: a three-dimensional
//! array with a name, a shape, element strides and (possibly) memory that lives
//! off-host. Concrete storages implement this trait directly; the harness never
//! sees them except through [`crate::FieldView`] and [`crate::FieldCopy`].

use crate::types::{Element, Extents, StorageMeta, Strides};

/// Capability set required from a concrete field storage.
///
/// The trait is deliberately not object safe (`Self: Sized` methods, generic
/// closures). Uniform access goes through the erased handles in [`crate::erased`].
///
/// Element access follows the semantics of a host view in the grid library:
/// `get`/`set` touch the host copy of the data, so callers must [`sync`] before
/// reading values that were produced on the device.
///
/// [`sync`]: Field::sync
pub trait Field {
    type Elem: Element;

    /// Name of the field as registered with the storage.
    fn name(&self) -> &str;

    /// Shape, halo and layout.
    fn meta(&self) -> StorageMeta;

    /// Make the host copy current (and push host-side modifications back).
    ///
    /// Must be idempotent. A no-op for storages that are always host-resident.
    fn sync(&self);

    /// Read the host value at `(i, j, k)`.
    fn get(&self, i: usize, j: usize, k: usize) -> Self::Elem;

    /// Write the host value at `(i, j, k)`.
    fn set(&self, i: usize, j: usize, k: usize, value: Self::Elem);

    /// Run `f` over the raw host buffer (laid out according to [`Field::meta`]).
    fn with_host_data<R>(&self, f: impl FnOnce(&[Self::Elem]) -> R) -> R;

    /// Run `f` over the raw, mutable host buffer.
    fn with_host_data_mut<R>(&self, f: impl FnOnce(&mut [Self::Elem]) -> R) -> R;

    /// Allocate a new field of the same concrete type holding a copy of the data.
    fn deep_copy(&self) -> Self
    where
        Self: Sized;

    fn extents(&self) -> Extents {
        self.meta().extents()
    }

    fn strides(&self) -> Strides {
        self.meta().strides()
    }
}
