//! Property tests for the type-erased field handles.
//!
//! Views and copies must expose the same values as the concrete storage they
//! wrap, regardless of layout, halo or residency.

use proptest::prelude::*;
use stencil_core::{
    DeviceField, Extents, Field, FieldCopy, FieldView, Halo, HostField, Layout, StorageMeta,
};

// ── Strategies ───────────────────────────────────────────────────────────

fn arb_layout() -> impl Strategy<Value = Layout> {
    prop_oneof![Just(Layout::KFastest), Just(Layout::IFastest)]
}

fn arb_meta() -> impl Strategy<Value = StorageMeta> {
    (1usize..=6, 1usize..=6, 1usize..=4, 0usize..=2, arb_layout()).prop_map(
        |(i, j, k, halo, layout)| {
            StorageMeta::with_halo(Extents::new(i, j, k), Halo::uniform(halo)).layout(layout)
        },
    )
}

fn value(i: usize, j: usize, k: usize) -> f64 {
    (i * 10_000 + j * 100 + k) as f64
}

// ── View / copy agreement ────────────────────────────────────────────────

proptest! {
    /// A view reads exactly what the storage holds.
    #[test]
    fn view_matches_storage(meta in arb_meta()) {
        let field = HostField::from_fn("f", meta, value);
        let view = FieldView::new(&field);
        let ext = view.extents();
        prop_assert_eq!(ext, meta.extents());
        for i in 0..ext.i {
            for j in 0..ext.j {
                for k in 0..ext.k {
                    prop_assert_eq!(view.get(i, j, k), value(i, j, k));
                }
            }
        }
    }

    /// Strides reported by the view address the raw buffer.
    #[test]
    fn view_strides_address_buffer(meta in arb_meta()) {
        let field = HostField::from_fn("f", meta, value);
        let view = FieldView::new(&field);
        let ext = view.extents();
        let (i, j, k) = (ext.i - 1, ext.j - 1, ext.k - 1);
        let offset = i * view.i_stride() + j * view.j_stride() + k * view.k_stride();
        prop_assert_eq!(view.with_data(|d| d[offset]), value(i, j, k));
    }

    /// A copy of a device field equals the synced device data.
    #[test]
    fn copy_of_device_field(meta in arb_meta()) {
        let field = DeviceField::<f64>::new("d", meta);
        field.on_device(|meta, data| {
            let ext = meta.extents();
            for i in 0..ext.i {
                for j in 0..ext.j {
                    for k in 0..ext.k {
                        data[meta.offset(i, j, k)] = value(i, j, k);
                    }
                }
            }
        });
        let copy = FieldCopy::new(&field);
        let ext = copy.extents();
        prop_assert_eq!(copy.get(ext.i - 1, 0, ext.k - 1), value(ext.i - 1, 0, ext.k - 1));
        prop_assert_eq!(field.get(ext.i - 1, 0, ext.k - 1), value(ext.i - 1, 0, ext.k - 1));
    }
}

#[test]
fn erased_handles_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FieldView<'static, f64>>();
    assert_send_sync::<FieldCopy<f32>>();
}

#[test]
fn view_shared_across_threads() {
    let field = HostField::<f64>::new("u", StorageMeta::new(4, 4, 4));
    let view = FieldView::new(&field);
    std::thread::scope(|s| {
        for k in 0..4 {
            let view = view.clone();
            s.spawn(move || {
                for i in 0..4 {
                    for j in 0..4 {
                        view.set(i, j, k, value(i, j, k));
                    }
                }
            });
        }
    });
    assert_eq!(field.get(3, 2, 1), value(3, 2, 1));
    assert_eq!(field.name(), view.name());
}
