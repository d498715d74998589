//! Concrete field storages.
//!
//! Both storages are shared handles: cloning one yields another handle to the
//! same memory, the way data stores behave in the grid library. The harness
//! only requires the [`Field`] capability set from them; they share no base
//! type.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::field::Field;
use crate::types::{Element, StorageMeta};

// ---------------------------------------------------------------------------
// HostField<T>
// ---------------------------------------------------------------------------

/// Field whose memory always lives on the host.
#[derive(Clone)]
pub struct HostField<T: Element> {
    name: Arc<str>,
    meta: StorageMeta,
    data: Arc<RwLock<Vec<T>>>,
}

impl<T: Element> HostField<T> {
    /// Allocate a zero-initialised field.
    pub fn new(name: &str, meta: StorageMeta) -> Self {
        Self::filled(name, meta, T::default())
    }

    /// Allocate a field with every element set to `value`.
    pub fn filled(name: &str, meta: StorageMeta, value: T) -> Self {
        Self {
            name: Arc::from(name),
            meta,
            data: Arc::new(RwLock::new(vec![value; meta.numel()])),
        }
    }

    /// Allocate a field initialised from `f(i, j, k)`.
    pub fn from_fn(name: &str, meta: StorageMeta, f: impl Fn(usize, usize, usize) -> T) -> Self {
        let field = Self::new(name, meta);
        {
            let mut data = field.data.write();
            let ext = meta.extents();
            for i in 0..ext.i {
                for j in 0..ext.j {
                    for k in 0..ext.k {
                        data[meta.offset(i, j, k)] = f(i, j, k);
                    }
                }
            }
        }
        field
    }

    /// Copy of the raw buffer.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.read().clone()
    }
}

impl<T: Element> Field for HostField<T> {
    type Elem = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> StorageMeta {
        self.meta
    }

    fn sync(&self) {}

    fn get(&self, i: usize, j: usize, k: usize) -> T {
        self.data.read()[self.meta.offset(i, j, k)]
    }

    fn set(&self, i: usize, j: usize, k: usize, value: T) {
        let idx = self.meta.offset(i, j, k);
        self.data.write()[idx] = value;
    }

    fn with_host_data<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.data.read())
    }

    fn with_host_data_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        f(&mut self.data.write())
    }

    fn deep_copy(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            meta: self.meta,
            data: Arc::new(RwLock::new(self.to_vec())),
        }
    }
}

impl<T: Element> std::fmt::Debug for HostField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostField")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DeviceField<T>
// ---------------------------------------------------------------------------

/// Which side of a mirrored field holds the newest data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    Synced,
    HostModified,
    DeviceModified,
}

struct Mirror<T> {
    host: Vec<T>,
    device: Vec<T>,
    state: Residency,
    transfers: usize,
}

/// Field with a device buffer and a host mirror.
///
/// Host accessors read and write the mirror. Device kernels run through
/// [`DeviceField::on_device`]. [`Field::sync`] copies the newer side over the
/// older one; host writes made while the device side is newer win on the next
/// sync.
#[derive(Clone)]
pub struct DeviceField<T: Element> {
    name: Arc<str>,
    meta: StorageMeta,
    mirror: Arc<Mutex<Mirror<T>>>,
}

impl<T: Element> DeviceField<T> {
    pub fn new(name: &str, meta: StorageMeta) -> Self {
        Self::filled(name, meta, T::default())
    }

    pub fn filled(name: &str, meta: StorageMeta, value: T) -> Self {
        let n = meta.numel();
        Self {
            name: Arc::from(name),
            meta,
            mirror: Arc::new(Mutex::new(Mirror {
                host: vec![value; n],
                device: vec![value; n],
                state: Residency::Synced,
                transfers: 0,
            })),
        }
    }

    /// Run a "kernel" over the device buffer. Marks the host mirror stale.
    pub fn on_device<R>(&self, f: impl FnOnce(&StorageMeta, &mut [T]) -> R) -> R {
        let mut mirror = self.mirror.lock();
        mirror.state = Residency::DeviceModified;
        f(&self.meta, &mut mirror.device)
    }

    pub fn residency(&self) -> Residency {
        self.mirror.lock().state
    }

    /// Number of host/device copies performed so far.
    pub fn transfers(&self) -> usize {
        self.mirror.lock().transfers
    }
}

impl<T: Element> Field for DeviceField<T> {
    type Elem = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> StorageMeta {
        self.meta
    }

    fn sync(&self) {
        let mut mirror = self.mirror.lock();
        let Mirror {
            host,
            device,
            state,
            transfers,
        } = &mut *mirror;
        match *state {
            Residency::Synced => return,
            Residency::DeviceModified => host.copy_from_slice(device.as_slice()),
            Residency::HostModified => device.copy_from_slice(host.as_slice()),
        }
        *state = Residency::Synced;
        *transfers += 1;
    }

    fn get(&self, i: usize, j: usize, k: usize) -> T {
        self.mirror.lock().host[self.meta.offset(i, j, k)]
    }

    fn set(&self, i: usize, j: usize, k: usize, value: T) {
        let idx = self.meta.offset(i, j, k);
        let mut mirror = self.mirror.lock();
        mirror.host[idx] = value;
        mirror.state = Residency::HostModified;
    }

    fn with_host_data<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.mirror.lock().host)
    }

    fn with_host_data_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        let mut mirror = self.mirror.lock();
        mirror.state = Residency::HostModified;
        f(&mut mirror.host)
    }

    fn deep_copy(&self) -> Self {
        self.sync();
        let host = self.mirror.lock().host.clone();
        Self {
            name: Arc::clone(&self.name),
            meta: self.meta,
            mirror: Arc::new(Mutex::new(Mirror {
                device: host.clone(),
                host,
                state: Residency::Synced,
                transfers: 0,
            })),
        }
    }
}

impl<T: Element> std::fmt::Debug for DeviceField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceField")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .field("residency", &self.residency())
            .finish_non_exhaustive()
    }
}
