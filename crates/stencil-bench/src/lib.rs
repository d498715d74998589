//! Benchmarking support for stencil kernels.
//!
//! A benchmark is configured by a [`BenchmarkSpec`] (parsed from the
//! `--benchmark` keyword string), timed with a [`Timer`] between
//! [`CacheFlusher::flush`] calls, and summarized by a [`BenchmarkReporter`]
//! which can merge the mean runtime into a JSON result document.

pub mod cache;
pub mod init;
pub mod reporter;
pub mod spec;
pub mod timer;

pub use cache::CacheFlusher;
pub use init::FieldInitializer;
pub use reporter::{BenchmarkReporter, BenchmarkStats};
pub use spec::{BenchmarkSpec, FileMode};
pub use timer::Timer;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("BenchmarkReporter of '{0}': no measurements found")]
    NoMeasurements(String),

    #[error("invalid benchmark name '{0}', expected 'Benchmark.Stencil'")]
    InvalidName(String),

    #[error("benchmark file '{path}' is malformed: {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error("invalid range [{lo}, {hi})")]
    InvalidRange { lo: String, hi: String },

    #[error(transparent)]
    Spec(#[from] stencil_core::StencilError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
