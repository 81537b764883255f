//! Conversion between `realfft`'s complex half spectrum and the packed
//! real layout.

use realfft::num_complex::Complex;

/// Packs `N/2 + 1` complex bins into `N` reals, multiplying by `scale`.
///
/// The imaginary parts of the DC and Nyquist bins are dropped; they are
/// zero for the spectrum of a real signal.
pub(crate) fn pack(spectrum: &[Complex<f32>], scale: f32, packed: &mut [f32]) {
    let n = packed.len();
    assert_eq!(spectrum.len(), n / 2 + 1);
    packed[0] = spectrum[0].re * scale;
    for (k, bin) in spectrum[1..n / 2].iter().enumerate() {
        packed[2 * k + 1] = bin.re * scale;
        packed[2 * k + 2] = bin.im * scale;
    }
    packed[n - 1] = spectrum[n / 2].re * scale;
}

/// Unpacks `N` reals into `N/2 + 1` complex bins with real DC and Nyquist.
pub(crate) fn unpack(packed: &[f32], spectrum: &mut [Complex<f32>]) {
    let n = packed.len();
    assert_eq!(spectrum.len(), n / 2 + 1);
    spectrum[0] = Complex::new(packed[0], 0.0);
    for (k, bin) in spectrum[1..n / 2].iter_mut().enumerate() {
        *bin = Complex::new(packed[2 * k + 1], packed[2 * k + 2]);
    }
    spectrum[n / 2] = Complex::new(packed[n - 1], 0.0);
}
