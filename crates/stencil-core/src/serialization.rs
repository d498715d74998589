//! Serializer collaborator interface and the typed load/write helper.
//!
//! A [`Serializer`] is a keyed point-in-time blob store: an ordered list of
//! [`Savepoint`]s, a registry of field properties, and raw strided reads and
//! writes. [`Serialization`] sits on top and moves whole fields between a
//! [`FieldView`] and the store, checking shape and scalar type first.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::erased::FieldView;
use crate::types::{Element, Extents, ScalarKind, Strides};
use crate::{Result, StencilError};

// ---------------------------------------------------------------------------
// Tagged buffers
// ---------------------------------------------------------------------------

/// Borrowed element buffer tagged with its scalar type.
#[derive(Clone, Copy, Debug)]
pub enum ScalarSlice<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl ScalarSlice<'_> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarSlice::F32(_) => ScalarKind::F32,
            ScalarSlice::F64(_) => ScalarKind::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarSlice::F32(s) => s.len(),
            ScalarSlice::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable element buffer tagged with its scalar type.
#[derive(Debug)]
pub enum ScalarSliceMut<'a> {
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
}

impl ScalarSliceMut<'_> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarSliceMut::F32(_) => ScalarKind::F32,
            ScalarSliceMut::F64(_) => ScalarKind::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarSliceMut::F32(s) => s.len(),
            ScalarSliceMut::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Savepoints
// ---------------------------------------------------------------------------

/// Meta-information value attached to a savepoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(v) => write!(f, "{v}"),
            MetaValue::Int(v) => write!(f, "{v}"),
            MetaValue::Float(v) => write!(f, "{v}"),
            MetaValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Int(i64::from(v))
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        MetaValue::Int(v as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

/// Named, ordered point in a serialized trace.
///
/// Two savepoints are the same savepoint iff name and meta-information agree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Savepoint {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, MetaValue>,
}

impl Savepoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: BTreeMap::new(),
        }
    }

    /// Attach a meta-information entry.
    pub fn with(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.to_owned(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.meta.is_empty() {
            let entries: Vec<String> = self.meta.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", entries.join(", "))?;
        }
        Ok(())
    }
}

/// Registered properties of a serialized field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: ScalarKind,
    /// Registered extents. A `0` marks an absent trailing dimension.
    pub dims: [usize; 3],
}

// ---------------------------------------------------------------------------
// Serializer trait
// ---------------------------------------------------------------------------

/// Keyed point-in-time blob store consumed by the harness.
///
/// Methods take `&self`; implementations keep their state behind interior
/// mutability so handles can be shared as `Arc<dyn Serializer>`.
pub trait Serializer: Send + Sync {
    /// All savepoints, in recording order.
    fn savepoints(&self) -> Vec<Savepoint>;

    /// Registered properties of `name`.
    fn field_info(&self, name: &str) -> Result<FieldInfo>;

    /// Register a field. Registering identical properties twice is a no-op.
    fn register_field(&self, name: &str, kind: ScalarKind, dims: [usize; 3]) -> Result<()>;

    /// Scatter the data of `name` at `savepoint` into `dst` using `strides`.
    fn read(
        &self,
        name: &str,
        savepoint: &Savepoint,
        dst: ScalarSliceMut<'_>,
        strides: Strides,
    ) -> Result<()>;

    /// Gather `src` (laid out with `strides`) and store it as `name` at `savepoint`.
    fn write(
        &self,
        name: &str,
        savepoint: &Savepoint,
        src: ScalarSlice<'_>,
        strides: Strides,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Serialization helper
// ---------------------------------------------------------------------------

/// Whether a field registered with `serialized` dims can be read into a field
/// of `given` extents. A serialized `0` accepts everything from that axis on.
pub fn sizes_compatible(serialized: [usize; 3], given: Extents) -> bool {
    for (s, g) in serialized.into_iter().zip(given.to_array()) {
        if s == 0 {
            return true;
        }
        if s != g {
            return false;
        }
    }
    true
}

fn format_dims(dims: [usize; 3]) -> String {
    dims.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Typed load/write of whole fields through a [`Serializer`].
pub struct Serialization<'s> {
    serializer: &'s dyn Serializer,
}

impl<'s> Serialization<'s> {
    pub fn new(serializer: &'s dyn Serializer) -> Self {
        Self { serializer }
    }

    /// Read `name` at `savepoint` into `field`.
    pub fn load<T: Element>(
        &self,
        name: &str,
        field: &FieldView<'_, T>,
        savepoint: &Savepoint,
    ) -> Result<()> {
        field.sync();

        let info = self.serializer.field_info(name)?;
        let extents = field.extents();
        if !sizes_compatible(info.dims, extents) {
            return Err(StencilError::SizeMismatch {
                name: name.to_owned(),
                registered: format_dims(info.dims),
                given: format_dims(extents.to_array()),
            });
        }
        if info.kind != T::KIND {
            return Err(StencilError::TypeMismatch {
                name: name.to_owned(),
                registered: info.kind,
                given: T::KIND,
            });
        }

        debug!(field = name, savepoint = %savepoint, "loading field");
        let strides = field.strides();
        field.with_data_mut(|data| {
            self.serializer
                .read(name, savepoint, T::tag_slice_mut(data), strides)
        })?;

        field.sync();
        Ok(())
    }

    /// Write `field` as `name` at `savepoint`. An empty `name` uses the field's own.
    pub fn write<T: Element>(
        &self,
        name: &str,
        field: &FieldView<'_, T>,
        savepoint: &Savepoint,
    ) -> Result<()> {
        field.sync();

        let name = if name.is_empty() { field.name() } else { name };
        self.serializer
            .register_field(name, T::KIND, field.extents().to_array())?;

        debug!(field = name, savepoint = %savepoint, "writing field");
        let strides = field.strides();
        field.with_data(|data| {
            self.serializer
                .write(name, savepoint, T::tag_slice(data), strides)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::storage::HostField;
    use crate::types::{Layout, StorageMeta};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Dense f64-only in-memory store, k fastest.
    #[derive(Default)]
    struct MemoryStore {
        savepoints: Mutex<Vec<Savepoint>>,
        fields: Mutex<HashMap<String, FieldInfo>>,
        data: Mutex<HashMap<(String, String), Vec<f64>>>,
    }

    fn key(name: &str, sp: &Savepoint) -> (String, String) {
        (name.to_owned(), sp.to_string())
    }

    impl Serializer for MemoryStore {
        fn savepoints(&self) -> Vec<Savepoint> {
            self.savepoints.lock().clone()
        }

        fn field_info(&self, name: &str) -> Result<FieldInfo> {
            self.fields
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| StencilError::FieldNotFound(name.to_owned()))
        }

        fn register_field(&self, name: &str, kind: ScalarKind, dims: [usize; 3]) -> Result<()> {
            self.fields.lock().insert(
                name.to_owned(),
                FieldInfo {
                    name: name.to_owned(),
                    kind,
                    dims,
                },
            );
            Ok(())
        }

        fn read(
            &self,
            name: &str,
            savepoint: &Savepoint,
            dst: ScalarSliceMut<'_>,
            strides: Strides,
        ) -> Result<()> {
            let [ni, nj, nk] = self.field_info(name)?.dims;
            let data = self.data.lock();
            let src = data.get(&key(name, savepoint)).ok_or_else(|| StencilError::DataNotFound {
                field: name.to_owned(),
                savepoint: savepoint.to_string(),
            })?;
            let ScalarSliceMut::F64(dst) = dst else {
                panic!("f64 only");
            };
            for i in 0..ni {
                for j in 0..nj {
                    for k in 0..nk {
                        dst[strides.offset(i, j, k)] = src[(i * nj + j) * nk + k];
                    }
                }
            }
            Ok(())
        }

        fn write(
            &self,
            name: &str,
            savepoint: &Savepoint,
            src: ScalarSlice<'_>,
            strides: Strides,
        ) -> Result<()> {
            let [ni, nj, nk] = self.field_info(name)?.dims;
            let ScalarSlice::F64(src) = src else {
                panic!("f64 only");
            };
            let mut dense = Vec::with_capacity(ni * nj * nk);
            for i in 0..ni {
                for j in 0..nj {
                    for k in 0..nk {
                        dense.push(src[strides.offset(i, j, k)]);
                    }
                }
            }
            let mut sps = self.savepoints.lock();
            if !sps.contains(savepoint) {
                sps.push(savepoint.clone());
            }
            self.data.lock().insert(key(name, savepoint), dense);
            Ok(())
        }
    }

    #[test]
    fn test_sizes_compatible() {
        assert!(sizes_compatible([4, 5, 6], Extents::new(4, 5, 6)));
        assert!(!sizes_compatible([4, 5, 6], Extents::new(4, 5, 7)));
        assert!(sizes_compatible([4, 5, 0], Extents::new(4, 5, 1)));
        assert!(sizes_compatible([4, 0, 0], Extents::new(4, 9, 3)));
        assert!(!sizes_compatible([3, 0, 0], Extents::new(4, 9, 3)));
    }

    #[test]
    fn test_write_then_load_across_layouts() {
        let store = MemoryStore::default();
        let ser = Serialization::new(&store);
        let sp = Savepoint::new("step").with("iteration", 3);

        let meta = StorageMeta::new(4, 3, 2);
        let src = HostField::<f64>::from_fn("u", meta, |i, j, k| (i * 100 + j * 10 + k) as f64);
        ser.write("", &FieldView::new(&src), &sp).unwrap();
        assert_eq!(store.field_info("u").unwrap().dims, [4, 3, 2]);

        let dst = HostField::<f64>::new("v", meta.layout(Layout::IFastest));
        ser.load("u", &FieldView::new(&dst), &sp).unwrap();
        assert_eq!(dst.get(3, 2, 1), 321.0);
        assert_eq!(dst.get(1, 0, 1), 101.0);
    }

    #[test]
    fn test_load_size_mismatch() {
        let store = MemoryStore::default();
        store.register_field("u", ScalarKind::F64, [4, 3, 2]).unwrap();
        let dst = HostField::<f64>::new("u", StorageMeta::new(4, 3, 5));
        let err = Serialization::new(&store)
            .load("u", &FieldView::new(&dst), &Savepoint::new("s"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the requested field 'u' has a different size than the provided field.\n\
             Registered as: (4, 3, 2)\n\
             Given      as: (4, 3, 5)"
        );
    }

    #[test]
    fn test_load_type_mismatch() {
        let store = MemoryStore::default();
        store.register_field("u", ScalarKind::F64, [2, 2, 2]).unwrap();
        let dst = HostField::<f32>::new("u", StorageMeta::new(2, 2, 2));
        let err = Serialization::new(&store)
            .load("u", &FieldView::new(&dst), &Savepoint::new("s"))
            .unwrap_err();
        assert!(matches!(err, StencilError::TypeMismatch { .. }));
    }

    #[test]
    fn test_load_unknown_field() {
        let store = MemoryStore::default();
        let dst = HostField::<f64>::new("u", StorageMeta::new(2, 2, 2));
        let err = Serialization::new(&store)
            .load("u", &FieldView::new(&dst), &Savepoint::new("s"))
            .unwrap_err();
        assert!(matches!(err, StencilError::FieldNotFound(ref n) if n == "u"));
    }

    #[test]
    fn test_savepoint_display_and_identity() {
        let a = Savepoint::new("stage").with("k", 2).with("flag", true);
        assert_eq!(a.to_string(), "stage [flag=true, k=2]");
        assert_eq!(Savepoint::new("plain").to_string(), "plain");
        assert_ne!(a, Savepoint::new("stage"));
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_meta_value_json() {
        let sp = Savepoint::new("s").with("n", 4).with("dt", 0.5).with("tag", "x");
        let json = serde_json::to_string(&sp).unwrap();
        let back: Savepoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sp);
    }
}
