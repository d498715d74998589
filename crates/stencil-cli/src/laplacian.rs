//! Reference kernel driven by the `record`, `check` and `bench` commands.

use stencil_core::{Element, FieldView, Halo};

/// 7-point Laplacian of `phi` written to `lap` over the horizontal interior.
///
/// The top and bottom layers use a zero-gradient closure in k. The halo of
/// `lap` is left untouched.
pub fn laplacian<T: Element>(phi: &FieldView<'_, T>, lap: &FieldView<'_, T>, halo: Halo) {
    let (ni, nj, nk) = (phi.i_size(), phi.j_size(), phi.k_size());
    let six = T::from_f64(6.0);

    for i in halo.i_minus.max(1)..ni.saturating_sub(halo.i_plus.max(1)) {
        for j in halo.j_minus.max(1)..nj.saturating_sub(halo.j_plus.max(1)) {
            for k in 0..nk {
                let center = phi.get(i, j, k);
                let below = if k > 0 { phi.get(i, j, k - 1) } else { center };
                let above = if k + 1 < nk { phi.get(i, j, k + 1) } else { center };
                let value = phi.get(i + 1, j, k)
                    + phi.get(i - 1, j, k)
                    + phi.get(i, j + 1, k)
                    + phi.get(i, j - 1, k)
                    + above
                    + below
                    - six * center;
                lap.set(i, j, k, value);
            }
        }
    }
}
