//! Serialized trace archives: a JSON index plus safetensors payloads.
//!
//! An archive is a directory:
//!
//! ```text
//! <dir>/archive.json               ordered savepoints, field registry
//! <dir>/savepoint-<n>.safetensors  every field stored at savepoint n
//! ```
//!
//! Payloads hold dense arrays with k as the fastest axis. Reads and writes go
//! through strided scatter/gather so any field layout can be loaded or stored.
//! Payloads are loaded lazily through a memory map and cached; writes stay in
//! memory until [`Archive::flush`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::Mutex;
use safetensors::SafeTensors;
use safetensors::tensor::TensorView;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stencil_core::{
    FieldInfo, Result, Savepoint, ScalarKind, ScalarSlice, ScalarSliceMut, Serializer,
    StencilError, Strides,
};

const INDEX_FILE: &str = "archive.json";

fn payload_file(n: usize) -> String {
    format!("savepoint-{n}.safetensors")
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FieldEntry {
    kind: ScalarKind,
    dims: [usize; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SavepointEntry {
    savepoint: Savepoint,
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Index {
    #[serde(default)]
    fields: BTreeMap<String, FieldEntry>,
    #[serde(default)]
    savepoints: Vec<SavepointEntry>,
}

impl Index {
    fn position(&self, savepoint: &Savepoint) -> Option<usize> {
        self.savepoints.iter().position(|e| &e.savepoint == savepoint)
    }
}

// ---------------------------------------------------------------------------
// Payload buffers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Buffer {
    fn kind(&self) -> ScalarKind {
        match self {
            Buffer::F32(_) => ScalarKind::F32,
            Buffer::F64(_) => ScalarKind::F64,
        }
    }

    fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
        }
    }

    fn decode(dtype: safetensors::Dtype, data: &[u8]) -> Result<Self> {
        let width = match dtype {
            safetensors::Dtype::F32 => 4,
            safetensors::Dtype::F64 => 8,
            _ => 1,
        };
        if data.len() % width != 0 {
            return Err(StencilError::Archive(format!(
                "payload of {} bytes is not a whole number of {dtype:?} elements",
                data.len()
            )));
        }
        match dtype {
            safetensors::Dtype::F32 => Ok(Buffer::F32(
                data.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            )),
            safetensors::Dtype::F64 => Ok(Buffer::F64(
                data.chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            )),
            other => Err(StencilError::Archive(format!(
                "unsupported safetensors dtype: {other:?}"
            ))),
        }
    }

    fn encode(&self) -> (safetensors::Dtype, Vec<u8>) {
        match self {
            Buffer::F32(v) => (
                safetensors::Dtype::F32,
                v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ),
            Buffer::F64(v) => (
                safetensors::Dtype::F64,
                v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ),
        }
    }
}

/// Registered dims with absent trailing axes counted as extent 1.
fn effective_dims(dims: [usize; 3]) -> [usize; 3] {
    dims.map(|d| d.max(1))
}

fn check_span(dims: [usize; 3], strides: Strides, len: usize, name: &str) -> Result<()> {
    let [ni, nj, nk] = dims;
    if ni * nj * nk == 0 {
        return Ok(());
    }
    let last = strides.offset(ni - 1, nj - 1, nk - 1);
    if last >= len {
        return Err(StencilError::InvalidArgument(format!(
            "buffer of field '{name}' is too small: {len} elements for dims {dims:?}"
        )));
    }
    Ok(())
}

fn gather<T: Copy>(src: &[T], dims: [usize; 3], strides: Strides) -> Vec<T> {
    let [ni, nj, nk] = dims;
    let mut dense = Vec::with_capacity(ni * nj * nk);
    for i in 0..ni {
        for j in 0..nj {
            for k in 0..nk {
                dense.push(src[strides.offset(i, j, k)]);
            }
        }
    }
    dense
}

fn scatter<T: Copy>(dense: &[T], dst: &mut [T], dims: [usize; 3], strides: Strides) {
    let [ni, nj, nk] = dims;
    for i in 0..ni {
        for j in 0..nj {
            for k in 0..nk {
                dst[strides.offset(i, j, k)] = dense[(i * nj + j) * nk + k];
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

type Payload = HashMap<String, Buffer>;

struct State {
    index: Index,
    payloads: HashMap<usize, Payload>,
    dirty: BTreeSet<usize>,
    index_dirty: bool,
}

/// Directory-backed [`Serializer`].
pub struct Archive {
    dir: PathBuf,
    state: Mutex<State>,
}

impl Archive {
    /// Create an empty archive in `dir`, discarding any archive already there.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == INDEX_FILE || (name.starts_with("savepoint-") && name.ends_with(".safetensors")) {
                fs::remove_file(&path)?;
            }
        }
        info!(dir = %dir.display(), "creating archive");
        Ok(Self::with_index(dir, Index::default(), true))
    }

    /// Open the archive in `dir`. New data is appended on [`Archive::flush`].
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(INDEX_FILE);
        if !path.is_file() {
            return Err(StencilError::Archive(format!(
                "no archive found in '{}'",
                dir.display()
            )));
        }
        let text = fs::read_to_string(&path)?;
        let index: Index = serde_json::from_str(&text)
            .map_err(|e| StencilError::Archive(format!("invalid {INDEX_FILE}: {e}")))?;
        info!(
            dir = %dir.display(),
            savepoints = index.savepoints.len(),
            fields = index.fields.len(),
            "opening archive"
        );
        Ok(Self::with_index(dir, index, false))
    }

    fn with_index(dir: PathBuf, index: Index, index_dirty: bool) -> Self {
        Self {
            dir,
            state: Mutex::new(State {
                index,
                payloads: HashMap::new(),
                dirty: BTreeSet::new(),
                index_dirty,
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all registered fields.
    pub fn fields(&self) -> Vec<String> {
        self.state.lock().index.fields.keys().cloned().collect()
    }

    /// Names of the fields stored at `savepoint`, in write order.
    pub fn fields_at(&self, savepoint: &Savepoint) -> Result<Vec<String>> {
        let state = self.state.lock();
        let n = state
            .index
            .position(savepoint)
            .ok_or_else(|| StencilError::SavepointNotFound(savepoint.to_string()))?;
        Ok(state.index.savepoints[n].fields.clone())
    }

    /// Write modified payloads and the index to disk.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let dirty: Vec<usize> = std::mem::take(&mut state.dirty).into_iter().collect();
        for n in dirty {
            if let Some(payload) = state.payloads.get(&n) {
                self.write_payload(n, payload)?;
            }
        }
        if state.index_dirty {
            let json = serde_json::to_string_pretty(&state.index)
                .map_err(|e| StencilError::Archive(format!("failed to encode index: {e}")))?;
            fs::write(self.dir.join(INDEX_FILE), json)?;
            state.index_dirty = false;
            debug!(dir = %self.dir.display(), "archive index written");
        }
        Ok(())
    }

    fn load_payload(&self, n: usize) -> Result<Payload> {
        let path = self.dir.join(payload_file(n));
        if !path.is_file() {
            return Ok(Payload::new());
        }
        debug!(path = %path.display(), "loading payload");
        let file = fs::File::open(&path)?;
        // SAFETY: The payload must not be modified while the mmap is alive.
        // It is only borrowed for the duration of this function.
        let mmap = unsafe { Mmap::map(&file)? };
        let st = SafeTensors::deserialize(&mmap)
            .map_err(|e| StencilError::Archive(format!("safetensors parse error: {e}")))?;
        let mut payload = Payload::new();
        for (name, view) in st.tensors() {
            payload.insert(name, Buffer::decode(view.dtype(), view.data())?);
        }
        Ok(payload)
    }

    fn write_payload(&self, n: usize, payload: &Payload) -> Result<()> {
        let encoded: Vec<(&str, safetensors::Dtype, Vec<u8>, usize)> = payload
            .iter()
            .map(|(name, buf)| {
                let (dtype, bytes) = buf.encode();
                let len = bytes.len() / buf.kind().size_bytes();
                (name.as_str(), dtype, bytes, len)
            })
            .collect();

        let views = encoded
            .iter()
            .map(|(name, dtype, bytes, len)| {
                TensorView::new(*dtype, vec![*len], bytes)
                    .map(|view| (*name, view))
                    .map_err(|e| StencilError::Archive(format!("safetensors view error: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let path = self.dir.join(payload_file(n));
        safetensors::serialize_to_file(views, &None, &path)
            .map_err(|e| StencilError::Archive(format!("safetensors save error: {e}")))?;
        debug!(path = %path.display(), fields = payload.len(), "payload written");
        Ok(())
    }
}

impl State {
    fn payload<'s>(&'s mut self, archive: &Archive, n: usize) -> Result<&'s mut Payload> {
        if !self.payloads.contains_key(&n) {
            let payload = archive.load_payload(n)?;
            self.payloads.insert(n, payload);
        }
        Ok(self.payloads.entry(n).or_default())
    }
}

impl Serializer for Archive {
    fn savepoints(&self) -> Vec<Savepoint> {
        self.state
            .lock()
            .index
            .savepoints
            .iter()
            .map(|e| e.savepoint.clone())
            .collect()
    }

    fn field_info(&self, name: &str) -> Result<FieldInfo> {
        let state = self.state.lock();
        let entry = state
            .index
            .fields
            .get(name)
            .ok_or_else(|| StencilError::FieldNotFound(name.to_owned()))?;
        Ok(FieldInfo {
            name: name.to_owned(),
            kind: entry.kind,
            dims: entry.dims,
        })
    }

    fn register_field(&self, name: &str, kind: ScalarKind, dims: [usize; 3]) -> Result<()> {
        let mut state = self.state.lock();
        match state.index.fields.get(name) {
            Some(entry) if entry.kind == kind && entry.dims == dims => Ok(()),
            Some(_) => Err(StencilError::InconsistentRegistration(name.to_owned())),
            None => {
                debug!(field = name, %kind, ?dims, "registering field");
                state
                    .index
                    .fields
                    .insert(name.to_owned(), FieldEntry { kind, dims });
                state.index_dirty = true;
                Ok(())
            }
        }
    }

    fn read(
        &self,
        name: &str,
        savepoint: &Savepoint,
        dst: ScalarSliceMut<'_>,
        strides: Strides,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .index
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| StencilError::FieldNotFound(name.to_owned()))?;
        let n = state
            .index
            .position(savepoint)
            .ok_or_else(|| StencilError::SavepointNotFound(savepoint.to_string()))?;
        let not_found = || StencilError::DataNotFound {
            field: name.to_owned(),
            savepoint: savepoint.to_string(),
        };
        if !state.index.savepoints[n].fields.iter().any(|f| f == name) {
            return Err(not_found());
        }

        let dims = effective_dims(entry.dims);
        check_span(dims, strides, dst.len(), name)?;
        let buffer = state.payload(self, n)?.get(name).ok_or_else(not_found)?;
        let [ni, nj, nk] = dims;
        if buffer.len() != ni * nj * nk {
            return Err(StencilError::Archive(format!(
                "field '{name}' at savepoint '{savepoint}' holds {} elements, index dims {:?} require {}",
                buffer.len(),
                entry.dims,
                ni * nj * nk
            )));
        }
        match (buffer, dst) {
            (Buffer::F32(src), ScalarSliceMut::F32(dst)) => scatter(src, dst, dims, strides),
            (Buffer::F64(src), ScalarSliceMut::F64(dst)) => scatter(src, dst, dims, strides),
            (buffer, dst) => {
                return Err(StencilError::TypeMismatch {
                    name: name.to_owned(),
                    registered: buffer.kind(),
                    given: dst.kind(),
                });
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
        let mut state = self.state.lock();
        let entry = state
            .index
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| StencilError::FieldNotFound(name.to_owned()))?;
        if entry.kind != src.kind() {
            return Err(StencilError::TypeMismatch {
                name: name.to_owned(),
                registered: entry.kind,
                given: src.kind(),
            });
        }
        let dims = effective_dims(entry.dims);
        check_span(dims, strides, src.len(), name)?;

        let n = match state.index.position(savepoint) {
            Some(n) => n,
            None => {
                state.index.savepoints.push(SavepointEntry {
                    savepoint: savepoint.clone(),
                    fields: Vec::new(),
                });
                state.index.savepoints.len() - 1
            }
        };
        if state.index.savepoints[n].fields.iter().any(|f| f == name) {
            return Err(StencilError::DataExists {
                field: name.to_owned(),
                savepoint: savepoint.to_string(),
            });
        }

        let buffer = match src {
            ScalarSlice::F32(s) => Buffer::F32(gather(s, dims, strides)),
            ScalarSlice::F64(s) => Buffer::F64(gather(s, dims, strides)),
        };
        state.payload(self, n)?.insert(name.to_owned(), buffer);
        state.index.savepoints[n].fields.push(name.to_owned());
        state.dirty.insert(n);
        state.index_dirty = true;
        Ok(())
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        let pending = {
            let state = self.state.lock();
            !state.dirty.is_empty() || state.index_dirty
        };
        if pending && let Err(e) = self.flush() {
            warn!(dir = %self.dir.display(), error = %e, "failed to flush archive");
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Archive")
            .field("dir", &self.dir)
            .field("savepoints", &state.index.savepoints.len())
            .field("fields", &state.index.fields.len())
            .finish_non_exhaustive()
    }
}
