//! Kernels over packed half spectra.
//!
//! A packed block of `N` reals holds the DC bin, `N/2 - 1` interleaved
//! real/imaginary pairs and the Nyquist bin. Power spectra have
//! `N/2 + 1` bins.

use crate::scalar::Scalar;

/// `sum x[i] * y[i]`, accumulated on the numeric backend.
pub(crate) fn inner_prod<T: Scalar>(x: &[f32], y: &[f32]) -> T {
    x.iter()
        .zip(y)
        .fold(T::ZERO, |acc, (&a, &b)| acc + T::from_f32(a) * T::from_f32(b))
}

/// Squared magnitude of every bin of `x` into `ps`.
pub(crate) fn power_spectrum<T: Scalar>(x: &[f32], ps: &mut [T]) {
    ps.fill(T::ZERO);
    power_spectrum_accum(x, ps);
}

/// Adds the squared magnitude of every bin of `x` to `ps`.
pub(crate) fn power_spectrum_accum<T: Scalar>(x: &[f32], ps: &mut [T]) {
    let n = x.len();
    debug_assert_eq!(ps.len(), n / 2 + 1);
    let square = |v: f32| {
        let v = T::from_f32(v);
        v * v
    };
    ps[0] = ps[0] + square(x[0]);
    for (p, pair) in ps[1..n / 2].iter_mut().zip(x[1..n - 1].chunks_exact(2)) {
        *p = *p + (square(pair[0]) + square(pair[1]));
    }
    ps[n / 2] = ps[n / 2] + square(x[n - 1]);
}

/// `acc = sum_b x_b * w_b` over consecutive blocks of `acc.len()` values.
///
/// This is the frequency-domain form of summing every partition's
/// convolution.
pub(crate) fn spectral_mul_accum(x: &[f32], w: &[f32], acc: &mut [f32]) {
    let n = acc.len();
    debug_assert_eq!(x.len(), w.len());
    acc.fill(0.0);
    for (xb, wb) in x.chunks_exact(n).zip(w.chunks_exact(n)) {
        acc[0] += xb[0] * wb[0];
        for i in (1..n - 1).step_by(2) {
            acc[i] += xb[i] * wb[i] - xb[i + 1] * wb[i + 1];
            acc[i + 1] += xb[i + 1] * wb[i] + xb[i] * wb[i + 1];
        }
        acc[n - 1] += xb[n - 1] * wb[n - 1];
    }
}

/// `prod = p * weights * conj(x) * y`, one weight per bin.
pub(crate) fn weighted_spectral_mul_conj<T: Scalar>(
    weights: &[T],
    p: T,
    x: &[f32],
    y: &[f32],
    prod: &mut [f32],
) {
    let n = prod.len();
    debug_assert_eq!(weights.len(), n / 2 + 1);
    let w = |bin: usize| (p * weights[bin]).to_f32();
    prod[0] = w(0) * x[0] * y[0];
    for (bin, i) in (1..n - 1).step_by(2).enumerate() {
        let g = w(bin + 1);
        prod[i] = g * (x[i] * y[i] + x[i + 1] * y[i + 1]);
        prod[i + 1] = g * (-x[i + 1] * y[i] + x[i] * y[i + 1]);
    }
    prod[n - 1] = w(n / 2) * x[n - 1] * y[n - 1];
}

/// Redistributes the adaptation budget across filter blocks.
///
/// Block `j` gets a share proportional to the L2 norm of its weights over
/// every microphone/speaker pair, lifted by a tenth of the largest norm,
/// with all shares summing to just under 0.99.
pub(crate) fn adjust_prop<T: Scalar>(
    weights: &[f32],
    window: usize,
    speakers: usize,
    prop: &mut [T],
) {
    let blocks = prop.len();
    let mut energy = vec![T::ONE; blocks];
    for (idx, block) in weights.chunks_exact(window).enumerate() {
        let j = (idx / speakers) % blocks;
        energy[j] = energy[j] + inner_prod(block, block);
    }
    let mut max_sum = T::ONE;
    for (p, &e) in prop.iter_mut().zip(&energy) {
        *p = e.sqrt();
        max_sum = max_sum.max(*p);
    }
    let lift = T::from_f32(0.1) * max_sum;
    let mut prop_sum = T::ONE;
    for p in prop.iter_mut() {
        *p = *p + lift;
        prop_sum = prop_sum + *p;
    }
    let scale = T::from_f32(0.99);
    for p in prop.iter_mut() {
        *p = scale * *p / prop_sum;
    }
}
