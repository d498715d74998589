//! Field collections: savepoint pairing, iteration loading and verification
//! of every registered output field.
//!
//! Usage follows the active-iteration style: register fields, then repeatedly
//! load the next iteration, run the computation, verify and report.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use stencil_core::{HostField, StorageMeta, Serializer};
//! # use stencil_verify::{BoundaryExtent, ErrorMetric, FieldCollection, VerificationReporter, VerificationSpec};
//! # fn run(archive: Arc<dyn Serializer>) -> stencil_core::Result<()> {
//! let input = HostField::<f64>::new("phi", StorageMeta::new(8, 8, 4));
//! let output = HostField::<f64>::new("lap", StorageMeta::new(8, 8, 4));
//!
//! let mut collection = FieldCollection::new(VerificationSpec::default());
//! collection.attach_reference_serializer(archive, "laplacian-in", "laplacian-out");
//! collection.register_input_field("phi", &input);
//! collection.register_output_and_reference_field("lap", &output, BoundaryExtent::default());
//!
//! while collection.next_iteration()?.is_some() {
//!     // ... compute `output` from `input` ...
//!     let result = collection.verify(&ErrorMetric::new(1e-6, 1e-10));
//!     if !result.passed() {
//!         collection.report_failures(&VerificationReporter::default(), &mut std::io::stdout())?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::Arc;

use stencil_core::{
    Element, Field, FieldCopy, FieldView, Result, Savepoint, Serialization, Serializer,
    StencilError,
};
use tracing::{debug, info};

use crate::boundary::BoundaryExtent;
use crate::metric::Metric;
use crate::reporter::VerificationReporter;
use crate::result::VerificationResult;
use crate::spec::VerificationSpec;
use crate::verification::Verification;

/// One replayable step of a trace: the input savepoint and the output
/// savepoint holding the reference values.
#[derive(Clone, Debug, PartialEq)]
pub struct SavepointPair {
    pub input: Savepoint,
    pub output: Savepoint,
}

impl fmt::Display for SavepointPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

/// Pair every savepoint named `out_name` with the nearest preceding savepoint
/// named `in_name`. Outputs without a preceding input are skipped.
pub fn pair_savepoints(
    savepoints: &[Savepoint],
    in_name: &str,
    out_name: &str,
) -> Vec<SavepointPair> {
    let mut pairs = Vec::new();
    for (n, output) in savepoints.iter().enumerate() {
        if output.name != out_name {
            continue;
        }
        if let Some(input) = savepoints[..n].iter().rev().find(|sp| sp.name == in_name) {
            pairs.push(SavepointPair {
                input: input.clone(),
                output: output.clone(),
            });
        }
    }
    pairs
}

struct InputField<'a, T: Element> {
    name: String,
    view: FieldView<'a, T>,
}

struct OutputField<'a, T: Element> {
    name: String,
    view: FieldView<'a, T>,
    reference: FieldCopy<T>,
    boundary: BoundaryExtent,
}

/// Registered input and output fields of one test case together with the
/// savepoint pairs they are replayed against.
///
/// Registered fields are borrowed for `'a`. Serializer handles are shared,
/// not owned.
pub struct FieldCollection<'a, T: Element> {
    spec: VerificationSpec,
    reference_serializer: Option<Arc<dyn Serializer>>,
    error_serializer: Option<Arc<dyn Serializer>>,
    iterations: Vec<SavepointPair>,
    next: usize,
    active: Option<usize>,
    inputs: Vec<InputField<'a, T>>,
    outputs: Vec<OutputField<'a, T>>,
    verifications: Vec<Verification<'a, T>>,
}

impl<'a, T: Element> FieldCollection<'a, T> {
    pub fn new(spec: VerificationSpec) -> Self {
        Self {
            spec,
            reference_serializer: None,
            error_serializer: None,
            iterations: Vec::new(),
            next: 0,
            active: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            verifications: Vec::new(),
        }
    }

    /// Use `serializer` as the source of input and reference data and discover
    /// the `(in_name, out_name)` savepoint pairs it contains.
    pub fn attach_reference_serializer(
        &mut self,
        serializer: Arc<dyn Serializer>,
        in_name: &str,
        out_name: &str,
    ) {
        self.iterations = pair_savepoints(&serializer.savepoints(), in_name, out_name);
        self.reference_serializer = Some(serializer);
        self.reset();
        info!(
            input = in_name,
            output = out_name,
            iterations = self.iterations.len(),
            "attached reference serializer"
        );
    }

    /// Use `serializer` as the destination of [`serialize_errors`](Self::serialize_errors).
    pub fn attach_error_serializer(&mut self, serializer: Arc<dyn Serializer>) {
        self.error_serializer = Some(serializer);
    }

    /// Register a field filled from the input savepoint of each iteration.
    pub fn register_input_field<F>(&mut self, name: &str, field: &'a F)
    where
        F: Field<Elem = T> + Send + Sync,
    {
        field.sync();
        self.inputs.push(InputField {
            name: name.to_owned(),
            view: FieldView::new(field),
        });
    }

    /// Register a computed field. A copy of it is allocated to receive the
    /// reference values of each iteration.
    pub fn register_output_and_reference_field<F>(
        &mut self,
        name: &str,
        field: &'a F,
        boundary: BoundaryExtent,
    ) where
        F: Field<Elem = T> + Send + Sync + 'static,
    {
        field.sync();
        self.outputs.push(OutputField {
            name: name.to_owned(),
            view: FieldView::new(field),
            reference: FieldCopy::new(field),
            boundary,
        });
    }

    /// Load iteration `n`: every input field from the input savepoint and
    /// every reference copy from the output savepoint.
    pub fn load_iteration(&mut self, n: usize) -> Result<()> {
        let pair = self
            .iterations
            .get(n)
            .ok_or(StencilError::IterationOutOfRange {
                index: n,
                count: self.iterations.len(),
            })?;
        let serializer = self.reference_serializer.as_deref().ok_or_else(|| {
            StencilError::InvalidArgument("no reference serializer attached".to_owned())
        })?;
        let serialization = Serialization::new(serializer);

        info!(savepoint = %pair.input, "loading input savepoint");
        for input in &self.inputs {
            serialization.load(&input.name, &input.view, &pair.input)?;
        }

        info!(savepoint = %pair.output, "loading reference savepoint");
        for output in &self.outputs {
            serialization.load(&output.name, &output.reference.to_view(), &pair.output)?;
        }

        self.active = Some(n);
        self.next = n + 1;
        Ok(())
    }

    /// Load the iteration after the active one. Returns its index, or `None`
    /// once every iteration has been loaded.
    pub fn next_iteration(&mut self) -> Result<Option<usize>> {
        if self.next >= self.iterations.len() {
            return Ok(None);
        }
        let n = self.next;
        self.load_iteration(n)?;
        Ok(Some(n))
    }

    /// Index of the last loaded iteration.
    pub fn active_iteration(&self) -> Option<usize> {
        self.active
    }

    pub fn active_pair(&self) -> Option<&SavepointPair> {
        self.active.and_then(|n| self.iterations.get(n))
    }

    /// Start over at the first iteration.
    pub fn reset(&mut self) {
        self.next = 0;
        self.active = None;
    }

    /// Verify every output field against its reference, in registration order.
    ///
    /// Verifications of a previous call are discarded.
    pub fn verify(&mut self, metric: &impl Metric<T>) -> VerificationResult {
        self.verifications.clear();
        let mut total = VerificationResult::default();
        for output in &self.outputs {
            let mut verification = Verification::new(
                output.view.clone(),
                output.reference.to_view(),
                output.boundary,
            );
            total.merge(verification.verify(metric));
            self.verifications.push(verification);
        }
        debug!(passed = total.passed(), "verified collection");
        total
    }

    /// Report every failed verification of the last [`verify`](Self::verify).
    ///
    /// Stops and returns [`ControlFlow::Break`] as soon as the reporter's
    /// stop-on-error policy fires.
    pub fn report_failures(
        &self,
        reporter: &VerificationReporter,
        out: &mut impl Write,
    ) -> std::io::Result<ControlFlow<()>> {
        for verification in self.verifications.iter().filter(|v| !v.passed()) {
            if reporter.report(verification, out)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Write every failing output field to the error serializer at `savepoint`.
    /// Returns the number of fields written.
    pub fn serialize_errors(&self, savepoint: &Savepoint) -> Result<usize> {
        let serializer = self.error_serializer.as_deref().ok_or_else(|| {
            StencilError::InvalidArgument("no error serializer attached".to_owned())
        })?;
        let serialization = Serialization::new(serializer);
        let mut written = 0;
        for (output, verification) in self.outputs.iter().zip(&self.verifications) {
            if verification.passed() {
                continue;
            }
            serialization.write(&output.name, &output.view, savepoint)?;
            written += 1;
        }
        debug!(savepoint = %savepoint, fields = written, "serialized erroneous fields");
        Ok(written)
    }

    pub fn iterations(&self) -> &[SavepointPair] {
        &self.iterations
    }

    pub fn reference_serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.reference_serializer.as_ref()
    }

    pub fn error_serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.error_serializer.as_ref()
    }

    pub fn verifications(&self) -> &[Verification<'a, T>] {
        &self.verifications
    }

    pub fn spec(&self) -> &VerificationSpec {
        &self.spec
    }

    /// A reporter configured with this collection's specification.
    pub fn reporter(&self) -> VerificationReporter {
        VerificationReporter::new(self.spec.clone())
    }
}
