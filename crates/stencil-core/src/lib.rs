//! Field abstractions for the stencil verification harness.
//!
//! `stencil-core` provides the foundational types (`Element`, `Extents`,
//! `StorageMeta`), the [`Field`] capability trait implemented by concrete
//! storages, the type-erased [`FieldView`] / [`FieldCopy`] handles the harness
//! works with, and the [`Serializer`] collaborator interface.
//!
//! # Storages
//!
//! - [`HostField`]: always host-resident, `sync` is a no-op
//! - [`DeviceField`]: device buffer with a host mirror, `sync` moves data

pub mod erased;
pub mod error;
pub mod field;
pub mod logging;
pub mod serialization;
pub mod storage;
pub mod types;
pub mod utility;

pub use erased::{ErasedField, FieldCopy, FieldView};
pub use field::Field;
pub use serialization::{
    FieldInfo, MetaValue, Savepoint, ScalarSlice, ScalarSliceMut, Serialization, Serializer,
};
pub use storage::{DeviceField, HostField, Residency};
pub use types::{Element, Extents, Halo, Layout, ScalarKind, StorageMeta, Strides};

pub type Result<T> = std::result::Result<T, StencilError>;

#[derive(thiserror::Error, Debug)]
pub enum StencilError {
    #[error(
        "the requested field '{name}' has a different size than the provided field.\n\
         Registered as: ({registered})\n\
         Given      as: ({given})"
    )]
    SizeMismatch {
        name: String,
        registered: String,
        given: String,
    },

    #[error("the requested field '{name}' has a different type than the provided field.")]
    TypeMismatch {
        name: String,
        registered: ScalarKind,
        given: ScalarKind,
    },

    #[error("field '{0}' is not registered")]
    FieldNotFound(String),

    #[error("savepoint '{0}' does not exist")]
    SavepointNotFound(String),

    #[error("field '{field}' has no data at savepoint '{savepoint}'")]
    DataNotFound { field: String, savepoint: String },

    #[error("field '{field}' already has data at savepoint '{savepoint}'")]
    DataExists { field: String, savepoint: String },

    #[error("field '{0}' is already registered with different properties")]
    InconsistentRegistration(String),

    #[error("invalid access of iteration '{index}' (there are only {count} iterations)")]
    IterationOutOfRange { index: usize, count: usize },

    #[error("{0}")]
    Parse(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
