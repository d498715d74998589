//! Random initialization of benchmark input fields.

use std::marker::PhantomData;

use rand::distr::Distribution;
use rand::distr::uniform::{SampleUniform, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stencil_core::{Element, FieldView};
use tracing::debug;

use crate::{BenchError, Result};

/// Fills fields with uniformly distributed random values.
#[derive(Clone, Debug)]
pub struct FieldInitializer<T> {
    rng: StdRng,
    _elem: PhantomData<T>,
}

impl<T: Element + SampleUniform> FieldInitializer<T> {
    /// Initializer seeded from the thread-local generator.
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Reproducible initializer.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            _elem: PhantomData,
        }
    }

    /// Fill every element of `field`, halo included, with values in `[a, b)`.
    pub fn init(&mut self, field: &FieldView<'_, T>, a: T, b: T) -> Result<()> {
        let dist = uniform(a, b)?;
        field.sync();
        debug!(
            field = field.name(),
            i = field.i_size(),
            j = field.j_size(),
            k = field.k_size(),
            "initializing field"
        );
        for i in 0..field.i_size() {
            for j in 0..field.j_size() {
                for k in 0..field.k_size() {
                    field.set(i, j, k, dist.sample(&mut self.rng));
                }
            }
        }
        Ok(())
    }

    /// [`init`](Self::init) with the range `[-10, 10)`.
    pub fn init_default(&mut self, field: &FieldView<'_, T>) -> Result<()> {
        self.init(field, T::from_f64(-10.0), T::from_f64(10.0))
    }

    /// A single random number in `[a, b)`.
    pub fn rand(&mut self, a: T, b: T) -> Result<T> {
        Ok(uniform(a, b)?.sample(&mut self.rng))
    }
}

impl<T: Element + SampleUniform> Default for FieldInitializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn uniform<T: Element + SampleUniform>(a: T, b: T) -> Result<Uniform<T>> {
    Uniform::new(a, b).map_err(|_| BenchError::InvalidRange {
        lo: a.to_string(),
        hi: b.to_string(),
    })
}
