//! Verification of computed stencil fields against serialized reference data.
//!
//! Compares live output fields element-wise against reference values loaded
//! from a serialized trace, using an absolute plus relative tolerance, and
//! renders mismatches as tables or per-layer ASCII art.
//!
//! # Components
//!
//! - [`ErrorMetric`]: tolerance-based equality
//! - [`BoundaryExtent`]: indentation of the compared region
//! - [`Verification`]: one output field against one reference field
//! - [`FieldCollection`]: savepoint pairing and iteration replay
//! - [`VerificationReporter`]: list and visualize renderers
//! - [`TestEnvironment`]: harness boundary for test bodies

pub mod boundary;
pub mod collection;
pub mod environment;
pub mod metric;
pub mod reporter;
pub mod result;
pub mod spec;
pub mod verification;

pub use boundary::BoundaryExtent;
pub use collection::{FieldCollection, SavepointPair, pair_savepoints};
pub use environment::TestEnvironment;
pub use metric::{ErrorMetric, Metric};
pub use reporter::{ErrorLayer, VerificationReporter};
pub use result::VerificationResult;
pub use spec::VerificationSpec;
pub use verification::{Failure, Verification};
