//! Test environment: the harness boundary between test bodies and the engine.
//!
//! Owns the shared serializer handles and the reporting options, hands out
//! field collections and turns unrecoverable conditions (missing reference
//! data, stop-on-error) into process termination.

use std::io::{self, Write};
use std::sync::Arc;

use console::style;
use stencil_core::error::fatal;
use stencil_core::{Element, Serializer};
use tracing::info;

use crate::collection::FieldCollection;
use crate::metric::{ErrorMetric, Metric};
use crate::spec::VerificationSpec;

/// Suffix of the savepoints holding the inputs of a test.
pub const INPUT_SUFFIX: &str = "-in";
/// Suffix of the savepoints holding the reference outputs of a test.
pub const OUTPUT_SUFFIX: &str = "-out";

pub struct TestEnvironment {
    reference: Arc<dyn Serializer>,
    error: Option<Arc<dyn Serializer>>,
    spec: VerificationSpec,
    skipped: Vec<String>,
}

impl TestEnvironment {
    pub fn new(reference: Arc<dyn Serializer>, spec: VerificationSpec) -> Self {
        Self {
            reference,
            error: None,
            spec,
            skipped: Vec::new(),
        }
    }

    /// Attach `serializer` to every collection created afterwards as its error
    /// serializer.
    pub fn with_error_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.error = Some(serializer);
        self
    }

    pub fn reference_serializer(&self) -> &Arc<dyn Serializer> {
        &self.reference
    }

    pub fn error_serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.error.as_ref()
    }

    pub fn spec(&self) -> &VerificationSpec {
        &self.spec
    }

    /// Collection replaying the `<name>-in` / `<name>-out` savepoint pairs.
    ///
    /// Without any pair the test is marked as skipped.
    pub fn create_field_collection<'a, T: Element>(&mut self, name: &str) -> FieldCollection<'a, T> {
        info!(name, "creating field collection");
        let mut collection = FieldCollection::new(self.spec.clone());
        collection.attach_reference_serializer(
            Arc::clone(&self.reference),
            &format!("{name}{INPUT_SUFFIX}"),
            &format!("{name}{OUTPUT_SUFFIX}"),
        );
        if let Some(error) = &self.error {
            collection.attach_error_serializer(Arc::clone(error));
        }

        if collection.iterations().is_empty() {
            println!(
                "{} Skipping test because there is no reference data",
                style("[   SKIP   ]").yellow()
            );
            self.skip_test(name);
        }
        collection
    }

    pub fn create_metric<T: Element>(&self, rtol: T, atol: T) -> ErrorMetric<T> {
        ErrorMetric::new(rtol, atol)
    }

    /// `rtol = 1e-6`, `atol = 1e-10`.
    pub fn default_metric<T: Element>(&self) -> ErrorMetric<T> {
        ErrorMetric::default()
    }

    /// Load the next iteration of `collection`. Serialization errors terminate
    /// the process.
    pub fn next_iteration<T: Element>(&self, collection: &mut FieldCollection<'_, T>) -> Option<usize> {
        match collection.next_iteration() {
            Ok(n) => n,
            Err(e) => fatal(e),
        }
    }

    /// Verify `collection` and report failures to stdout.
    ///
    /// Returns the failure message as the error. Terminates the process when
    /// the stop-on-error policy fires.
    pub fn verify_collection<T: Element>(
        &self,
        collection: &mut FieldCollection<'_, T>,
        metric: &impl Metric<T>,
    ) -> Result<(), String> {
        let result = collection.verify(metric);
        if result.passed() {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        match collection.report_failures(&collection.reporter(), &mut out) {
            Ok(flow) if flow.is_break() => {
                let _ = out.flush();
                fatal(format!("stopping on first error:\n{}", result.message()))
            }
            Ok(_) => Err(result.message()),
            Err(e) => Err(format!("{}\nfailed to report failures: {e}", result.message())),
        }
    }

    /// Mark `name` as skipped.
    pub fn skip_test(&mut self, name: &str) {
        self.skipped.push(name.to_owned());
    }

    pub fn skipped_tests(&self) -> &[String] {
        &self.skipped
    }

    /// Summary of skipped tests. Prints nothing if none were skipped.
    pub fn print_skipped_tests(&self, out: &mut impl Write) -> io::Result<()> {
        if self.skipped.is_empty() {
            return Ok(());
        }
        let tag = style("[  SKIPPED ]").yellow();
        writeln!(
            out,
            "{tag} {} test{} skipped, listed below:",
            self.skipped.len(),
            if self.skipped.len() == 1 { "" } else { "s" }
        )?;
        for name in &self.skipped {
            writeln!(out, "{tag} {name}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TestEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEnvironment")
            .field("spec", &self.spec)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
