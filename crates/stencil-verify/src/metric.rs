//! Tolerance metrics deciding element-wise equality.

use stencil_core::Element;

/// Decides whether an output value matches its reference value.
pub trait Metric<T: Element> {
    fn equal(&self, actual: T, reference: T) -> bool;
}

/// Absolute plus relative tolerance:
/// `|actual - reference| <= atol + rtol * |reference|`.
///
/// Stateless, so a single instance can be shared freely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorMetric<T> {
    rtol: T,
    atol: T,
}

impl<T: Element> ErrorMetric<T> {
    pub fn new(rtol: T, atol: T) -> Self {
        Self { rtol, atol }
    }

    pub fn rtol(&self) -> T {
        self.rtol
    }

    pub fn atol(&self) -> T {
        self.atol
    }
}

impl<T: Element> Default for ErrorMetric<T> {
    /// `rtol = 1e-6`, `atol = 1e-10`.
    fn default() -> Self {
        Self::new(T::from_f64(1e-6), T::from_f64(1e-10))
    }
}

impl<T: Element> Metric<T> for ErrorMetric<T> {
    #[inline]
    fn equal(&self, actual: T, reference: T) -> bool {
        (actual - reference).abs() <= self.atol + self.rtol * reference.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_within_atol() {
        let m = ErrorMetric::new(0.0_f64, 1e-3);
        assert!(m.equal(1.0005, 1.0));
        assert!(!m.equal(1.002, 1.0));
    }

    #[test]
    fn test_rtol_scales_with_reference() {
        let m = ErrorMetric::new(1e-2_f32, 0.0);
        assert!(m.equal(1005.0, 1000.0));
        assert!(!m.equal(1.5, 1.0));
    }

    #[test]
    fn test_asymmetric_in_reference() {
        let m = ErrorMetric::new(0.5_f64, 0.0);
        // tol = 0.5 * |reference|
        assert!(m.equal(0.0, 0.0));
        assert!(m.equal(1.0, 2.0));
        assert!(!m.equal(2.0, 1.0));
    }

    #[test]
    fn test_default_tolerances() {
        let m = ErrorMetric::<f64>::default();
        assert_eq!(m.rtol(), 1e-6);
        assert_eq!(m.atol(), 1e-10);
    }
}
