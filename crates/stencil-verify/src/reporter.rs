//! Rendering of verification failures: tabular listing and per-layer ASCII art.

use std::io::{self, Write};
use std::ops::ControlFlow;

use console::style;
use stencil_core::Element;

use crate::spec::VerificationSpec;
use crate::verification::{Failure, Verification};

/// Boolean mask over the (i, j) plane marking positions with a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLayer {
    i_size: usize,
    j_size: usize,
    mask: Vec<bool>,
}

impl ErrorLayer {
    /// Mask of size `i_size * j_size` with every position of `failures` set.
    /// Failures outside the plane are ignored.
    pub fn new<'f, T: 'f>(
        i_size: usize,
        j_size: usize,
        failures: impl IntoIterator<Item = &'f Failure<T>>,
    ) -> Self {
        let mut layer = Self {
            i_size,
            j_size,
            mask: vec![false; i_size * j_size],
        };
        for f in failures {
            if f.i < i_size && f.j < j_size {
                layer.mask[f.i * j_size + f.j] = true;
            }
        }
        layer
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        self.mask[i * self.j_size + j]
    }

    pub fn i_size(&self) -> usize {
        self.i_size
    }

    pub fn j_size(&self) -> usize {
        self.j_size
    }

    /// Number of marked positions.
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Reports failed verifications according to a [`VerificationSpec`].
#[derive(Clone, Debug, Default)]
pub struct VerificationReporter {
    spec: VerificationSpec,
}

impl VerificationReporter {
    pub fn new(spec: VerificationSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &VerificationSpec {
        &self.spec
    }

    /// Render the failures of `verification` to `out`.
    ///
    /// Returns [`ControlFlow::Break`] when the stop-on-error policy applies to
    /// this field. Terminating the process is left to the caller.
    pub fn report<T: Element>(
        &self,
        verification: &Verification<'_, T>,
        out: &mut impl Write,
    ) -> io::Result<ControlFlow<()>> {
        if self.spec.list() {
            self.list_failures(verification, out)?;
        }
        if self.spec.visualize() {
            self.visualize_failures(verification, out)?;
        }

        let name = verification.output_field().name();
        if self.spec.stop_on_error() && self.spec.matches_field(name) {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Table of `Position | Actual | Reference` rows.
    pub fn list_failures<T: Element>(
        &self,
        verification: &Verification<'_, T>,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let name = verification.output_field().name();
        if !self.spec.matches_field(name) {
            return Ok(());
        }
        let failures = verification.failures();
        if failures.is_empty() {
            return Ok(());
        }

        writeln!(
            out,
            "{:>13} | {:>24} | {:>24}",
            "Position",
            format!("Actual [{name}]"),
            "Reference"
        )?;
        writeln!(out, "{}", "-".repeat(67))?;

        let limit = self.spec.max_errors_to_list().unwrap_or(usize::MAX);
        for f in failures
            .iter()
            .filter(|f| self.spec.matches_k(f.k))
            .take(limit)
        {
            writeln!(
                out,
                "({:3},{:3},{:3}) | {:24.12} | {:24.12}",
                f.i, f.j, f.k, f.out_val, f.ref_val
            )?;
        }
        writeln!(out)
    }

    /// One ASCII grid per k-layer that contains failures.
    pub fn visualize_failures<T: Element>(
        &self,
        verification: &Verification<'_, T>,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let output = verification.output_field();
        if !self.spec.matches_field(output.name()) {
            return Ok(());
        }
        let reference = verification.reference_field();

        for k in self.spec.k_layers(reference.k_size()) {
            let k_failures: Vec<&Failure<T>> = verification
                .failures()
                .iter()
                .filter(|f| f.k == k)
                .collect();
            if k_failures.is_empty() {
                continue;
            }
            let layer = ErrorLayer::new(
                reference.i_size(),
                reference.j_size(),
                k_failures.iter().copied(),
            );
            print_layer(out, &layer, &k_failures, k, output.name())?;
        }
        Ok(())
    }
}

fn print_layer<T>(
    out: &mut impl Write,
    layer: &ErrorLayer,
    failures: &[&Failure<T>],
    k: usize,
    name: &str,
) -> io::Result<()> {
    write!(out, "\nk = {k} ({name})\n\n       j\n   0-------->\n")?;

    // Failure triples printed to the right of successive rows.
    let mut annotations = failures.iter();

    for i in 0..layer.i_size() {
        let arrow = match i {
            3 => "   v ",
            1 => " i | ",
            0 | 2 => "   | ",
            _ => "     ",
        };
        write!(out, "{arrow}")?;

        for j in 0..layer.j_size() {
            if layer.get(i, j) {
                write!(out, "{}", style("X ").red())?;
            } else {
                write!(out, "{}", style("X ").green())?;
            }
        }

        match annotations.next() {
            Some(f) => writeln!(out, " ({:3},{:3},{:3})", f.i, f.j, f.k)?,
            None => writeln!(out)?,
        }
    }
    writeln!(out)
}
