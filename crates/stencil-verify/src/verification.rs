//! Element-wise comparison of one output field against its reference.

use stencil_core::{Element, FieldView};
use tracing::debug;

use crate::boundary::BoundaryExtent;
use crate::metric::Metric;
use crate::result::VerificationResult;

/// One element that failed the metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Failure<T> {
    pub i: usize,
    pub j: usize,
    pub k: usize,
    pub out_val: T,
    pub ref_val: T,
}

/// Verification of an output field against a reference field.
#[derive(Clone, Debug)]
pub struct Verification<'a, T: Element> {
    output: FieldView<'a, T>,
    reference: FieldView<'a, T>,
    boundary: BoundaryExtent,
    failures: Vec<Failure<T>>,
    passed: bool,
}

impl<'a, T: Element> Verification<'a, T> {
    pub fn new(
        output: FieldView<'a, T>,
        reference: FieldView<'a, T>,
        boundary: BoundaryExtent,
    ) -> Self {
        Self {
            output,
            reference,
            boundary,
            failures: Vec::new(),
            passed: true,
        }
    }

    /// Compare the two fields element-wise.
    ///
    /// Both fields are synced first. Fields whose full extents differ fail
    /// without any element comparison. Otherwise every element inside the
    /// boundary is compared with `metric`, k outermost and i innermost, and
    /// each mismatch is recorded as a [`Failure`]. Failures of a previous run
    /// are discarded.
    pub fn verify(&mut self, metric: &impl Metric<T>) -> VerificationResult {
        self.output.sync();
        self.reference.sync();
        self.failures.clear();
        let result = self.compare(metric);
        self.passed = result.passed();
        result
    }

    fn compare(&mut self, metric: &impl Metric<T>) -> VerificationResult {
        let out = self.output.extents();
        let reference = self.reference.extents();
        if out != reference {
            return VerificationResult::fail(format!(
                "the output field '{}' has a different size than the reference field '{}'.\n \
                 {:<15} as: ({}, {}, {})\n {:<15} as: ({}, {}, {})",
                self.output.name(),
                self.reference.name(),
                self.output.name(),
                out.i,
                out.j,
                out.k,
                self.reference.name(),
                reference.i,
                reference.j,
                reference.k,
            ));
        }

        for k in self.boundary.k_range(out.k) {
            for j in self.boundary.j_range(out.j) {
                for i in self.boundary.i_range(out.i) {
                    let out_val = self.output.get(i, j, k);
                    let ref_val = self.reference.get(i, j, k);
                    if !metric.equal(out_val, ref_val) {
                        self.failures.push(Failure {
                            i,
                            j,
                            k,
                            out_val,
                            ref_val,
                        });
                    }
                }
            }
        }

        debug!(
            field = self.output.name(),
            failures = self.failures.len(),
            "verified field"
        );

        if self.failures.is_empty() {
            return VerificationResult::pass();
        }

        let percent = 100.0 * self.failures.len() as f64 / self.output.size() as f64;
        VerificationResult::fail(format!(
            "{percent:5.3} % of field entries of '{}' do not match (total of {})",
            self.output.name(),
            self.failures.len()
        ))
    }

    /// Mismatches recorded by the last [`verify`](Self::verify), in k/j/i order.
    pub fn failures(&self) -> &[Failure<T>] {
        &self.failures
    }

    /// Outcome of the last [`verify`](Self::verify). `true` before the first run.
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn output_field(&self) -> &FieldView<'a, T> {
        &self.output
    }

    pub fn reference_field(&self) -> &FieldView<'a, T> {
        &self.reference
    }

    pub fn boundary(&self) -> BoundaryExtent {
        self.boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::ErrorMetric;
    use stencil_core::{Field, FieldCopy, HostField, StorageMeta};

    fn ramp(meta: StorageMeta) -> HostField<f64> {
        HostField::from_fn("u", meta, |i, j, k| (i + 2 * j + 3 * k) as f64)
    }

    #[test]
    fn test_self_verification_passes() {
        let field = ramp(StorageMeta::new(4, 5, 3));
        let view = FieldView::new(&field);
        let mut v = Verification::new(view.clone(), view, BoundaryExtent::default());
        let result = v.verify(&ErrorMetric::new(1e-12, 1e-12));
        assert!(result.passed());
        assert_eq!(result.message(), "");
        assert!(!v.has_errors());
    }

    #[test]
    fn test_single_mutation() {
        let meta = StorageMeta::new(4, 5, 3);
        let field = ramp(meta);
        let reference = FieldCopy::new(&field);
        field.set(2, 3, 1, 100.0);

        let mut v = Verification::new(
            FieldView::new(&field),
            reference.to_view(),
            BoundaryExtent::default(),
        );
        let result = v.verify(&ErrorMetric::new(1e-6, 1e-6));
        assert!(!result.passed());
        assert_eq!(
            v.failures(),
            &[Failure {
                i: 2,
                j: 3,
                k: 1,
                out_val: 100.0,
                ref_val: (2 + 6 + 3) as f64,
            }]
        );
        assert_eq!(
            result.message(),
            "1.667 % of field entries of 'u' do not match (total of 1)"
        );
    }

    #[test]
    fn test_boundary_excludes_mismatch() {
        let field = ramp(StorageMeta::new(4, 4, 2));
        let reference = FieldCopy::new(&field);
        field.set(0, 0, 0, -1.0);
        field.set(3, 3, 1, -1.0);

        let boundary = BoundaryExtent::new(1, 1, 1, 1, 0, 0);
        let mut v = Verification::new(FieldView::new(&field), reference.to_view(), boundary);
        assert!(v.verify(&ErrorMetric::new(1e-6, 1e-6)).passed());

        let mut v = Verification::new(
            FieldView::new(&field),
            reference.to_view(),
            BoundaryExtent::default(),
        );
        assert!(!v.verify(&ErrorMetric::new(1e-6, 1e-6)).passed());
        assert_eq!(v.failures().len(), 2);
        assert_eq!(v.boundary(), BoundaryExtent::default());
    }

    #[test]
    fn test_size_mismatch() {
        let output = ramp(StorageMeta::new(4, 4, 3));
        let reference = HostField::<f64>::new("ref", StorageMeta::new(4, 4, 2));
        let mut v = Verification::new(
            FieldView::new(&output),
            FieldView::new(&reference),
            BoundaryExtent::default(),
        );
        let result = v.verify(&ErrorMetric::new(1e-6, 1e-6));
        assert!(!result.passed());
        assert!(v.failures().is_empty());
        assert_eq!(
            result.message(),
            "the output field 'u' has a different size than the reference field 'ref'.\n \
             u               as: (4, 4, 3)\n ref             as: (4, 4, 2)"
        );
    }

    #[test]
    fn test_failure_order_is_k_j_i() {
        let field = ramp(StorageMeta::new(2, 2, 2));
        let reference = FieldCopy::new(&field);
        for (i, j, k) in [(1, 1, 1), (0, 0, 1), (1, 0, 0), (0, 1, 0)] {
            field.set(i, j, k, 50.0);
        }
        let mut v = Verification::new(
            FieldView::new(&field),
            reference.to_view(),
            BoundaryExtent::default(),
        );
        v.verify(&ErrorMetric::new(1e-6, 1e-6));
        let order: Vec<_> = v.failures().iter().map(|f| (f.i, f.j, f.k)).collect();
        assert_eq!(order, [(1, 0, 0), (0, 1, 0), (0, 0, 1), (1, 1, 1)]);
    }

    #[test]
    fn test_rerun_is_not_cumulative() {
        let field = ramp(StorageMeta::new(3, 3, 3));
        let reference = FieldCopy::new(&field);
        field.set(1, 1, 1, 99.0);
        let mut v = Verification::new(
            FieldView::new(&field),
            reference.to_view(),
            BoundaryExtent::default(),
        );
        let metric = ErrorMetric::new(1e-6, 1e-6);
        v.verify(&metric);
        v.verify(&metric);
        assert_eq!(v.failures().len(), 1);
        assert!(!v.passed());

        field.set(1, 1, 1, 1.0 + 2.0 + 3.0);
        assert!(v.verify(&metric).passed());
        assert!(v.failures().is_empty());
    }
}
