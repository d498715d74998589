//! Type-erased fields: one non-generic handle over any [`Field`] storage.
//!
//! [`FieldView`] captures a field by reference (O(1), writes reach the original
//! storage). [`FieldCopy`] captures it by value (O(n), an independent snapshot).
//! Both dispatch through the object-safe [`ErasedField`] interface, implemented
//! by one adapter per ownership mode and selected when the handle is built.
//!
//! Erased handles do not implement [`Field`] themselves, so wrapping a view in
//! another view is rejected at compile time:
//!
//! ```compile_fail
//! use stencil_core::{FieldView, HostField, StorageMeta};
//!
//! let field = HostField::<f64>::new("u", StorageMeta::new(4, 4, 4));
//! let view = FieldView::new(&field);
//! let nested = FieldView::new(&view);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::field::Field;
use crate::types::{Element, Extents, StorageMeta, Strides};

/// Object-safe interface every adapter implements.
pub trait ErasedField<T: Element>: Send + Sync {
    fn get(&self, i: usize, j: usize, k: usize) -> T;
    fn set(&self, i: usize, j: usize, k: usize, value: T);
    fn name(&self) -> &str;
    fn meta(&self) -> StorageMeta;
    fn sync(&self);
    fn with_data(&self, f: &mut dyn FnMut(&[T]));
    fn with_data_mut(&self, f: &mut dyn FnMut(&mut [T]));
}

/// Adapter over a borrowed field.
struct BorrowedAdapter<'a, F> {
    field: &'a F,
}

/// Adapter over an owned field.
struct OwnedAdapter<F> {
    field: F,
}

macro_rules! forward_erased {
    ($adapter:ty, $($lt:lifetime)?) => {
        impl<$($lt,)? F> ErasedField<F::Elem> for $adapter
        where
            F: Field + Send + Sync,
        {
            fn get(&self, i: usize, j: usize, k: usize) -> F::Elem {
                self.field.get(i, j, k)
            }

            fn set(&self, i: usize, j: usize, k: usize, value: F::Elem) {
                self.field.set(i, j, k, value)
            }

            fn name(&self) -> &str {
                self.field.name()
            }

            fn meta(&self) -> StorageMeta {
                self.field.meta()
            }

            fn sync(&self) {
                self.field.sync()
            }

            fn with_data(&self, f: &mut dyn FnMut(&[F::Elem])) {
                self.field.with_host_data(|data| f(data))
            }

            fn with_data_mut(&self, f: &mut dyn FnMut(&mut [F::Elem])) {
                self.field.with_host_data_mut(|data| f(data))
            }
        }
    };
}

forward_erased!(BorrowedAdapter<'a, F>, 'a);
forward_erased!(OwnedAdapter<F>,);

// ---------------------------------------------------------------------------
// Shared accessors
// ---------------------------------------------------------------------------

macro_rules! erased_accessors {
    () => {
        /// Host value at `(i, j, k)`.
        #[inline]
        pub fn get(&self, i: usize, j: usize, k: usize) -> T {
            self.inner.get(i, j, k)
        }

        /// Write the host value at `(i, j, k)`.
        #[inline]
        pub fn set(&self, i: usize, j: usize, k: usize, value: T) {
            self.inner.set(i, j, k, value)
        }

        pub fn name(&self) -> &str {
            self.inner.name()
        }

        pub fn meta(&self) -> StorageMeta {
            self.inner.meta()
        }

        /// Full extents, halo included.
        pub fn extents(&self) -> Extents {
            self.inner.meta().extents()
        }

        pub fn strides(&self) -> Strides {
            self.inner.meta().strides()
        }

        pub fn i_size(&self) -> usize {
            self.extents().i
        }

        pub fn j_size(&self) -> usize {
            self.extents().j
        }

        pub fn k_size(&self) -> usize {
            self.extents().k
        }

        /// Total number of elements, halo included.
        pub fn size(&self) -> usize {
            self.extents().numel()
        }

        pub fn i_stride(&self) -> usize {
            self.strides().i
        }

        pub fn j_stride(&self) -> usize {
            self.strides().j
        }

        pub fn k_stride(&self) -> usize {
            self.strides().k
        }

        /// Make the data host-resident. Idempotent.
        pub fn sync(&self) {
            self.inner.sync()
        }

        /// Run `f` over the raw host buffer.
        pub fn with_data<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
            let mut f = Some(f);
            let mut out = None;
            self.inner.with_data(&mut |data| {
                if let Some(f) = f.take() {
                    out = Some(f(data));
                }
            });
            out.expect("erased field did not invoke the data callback")
        }

        /// Run `f` over the raw, mutable host buffer.
        pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
            let mut f = Some(f);
            let mut out = None;
            self.inner.with_data_mut(&mut |data| {
                if let Some(f) = f.take() {
                    out = Some(f(data));
                }
            });
            out.expect("erased field did not invoke the data callback")
        }
    };
}

// ---------------------------------------------------------------------------
// FieldView
// ---------------------------------------------------------------------------

/// Type-erased view of a field, captured by reference.
///
/// Construction is O(1) and cloning shares the same handle. The view borrows
/// the original field for `'a`; modifying values through the view modifies the
/// original.
#[derive(Clone)]
pub struct FieldView<'a, T: Element> {
    inner: Arc<dyn ErasedField<T> + 'a>,
}

impl<'a, T: Element> FieldView<'a, T> {
    /// Erase the type of `field`.
    pub fn new<F>(field: &'a F) -> Self
    where
        F: Field<Elem = T> + Send + Sync,
    {
        Self {
            inner: Arc::new(BorrowedAdapter { field }),
        }
    }

    erased_accessors!();
}

impl<T: Element> fmt::Debug for FieldView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldView")
            .field("name", &self.name())
            .field("extents", &self.extents())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FieldCopy
// ---------------------------------------------------------------------------

/// Type-erased field, captured by value.
///
/// Construction syncs the source and copies every element into a new storage
/// of the same concrete type, so later changes to either side are invisible to
/// the other.
#[derive(Clone)]
pub struct FieldCopy<T: Element> {
    inner: Arc<dyn ErasedField<T>>,
}

impl<T: Element> FieldCopy<T> {
    pub fn new<F>(field: &F) -> Self
    where
        F: Field<Elem = T> + Send + Sync + 'static,
    {
        field.sync();
        let owned = field.deep_copy();
        field.sync();
        Self {
            inner: Arc::new(OwnedAdapter { field: owned }),
        }
    }

    /// A reference view over this copy. The view shares ownership of the
    /// copied storage, so it is not tied to the lifetime of `self`.
    pub fn to_view(&self) -> FieldView<'static, T> {
        FieldView {
            inner: Arc::clone(&self.inner),
        }
    }

    erased_accessors!();
}

impl<T: Element> fmt::Debug for FieldCopy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCopy")
            .field("name", &self.name())
            .field("extents", &self.extents())
            .finish()
    }
}
