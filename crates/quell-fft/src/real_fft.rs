//! [`Transform`] backed by `realfft`.

use std::sync::Arc;

use derive_more::Debug;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::packed::{pack, unpack};
use crate::{Transform, TransformError};

/// Real FFT of any even block length.
#[derive(Debug)]
pub struct RealFft {
    len: usize,
    scale: f32,
    #[debug(skip)]
    forward: Arc<dyn RealToComplex<f32>>,
    #[debug(skip)]
    inverse: Arc<dyn ComplexToReal<f32>>,
    #[debug(skip)]
    time: Vec<f32>,
    #[debug(skip)]
    spectrum: Vec<Complex<f32>>,
    #[debug(skip)]
    scratch: Vec<Complex<f32>>,
}

impl RealFft {
    /// Plans forward and inverse transforms of `len` samples.
    pub fn new(len: usize) -> Result<Self, TransformError> {
        if len == 0 {
            return Err(TransformError::ZeroLength);
        }
        if len % 2 != 0 {
            return Err(TransformError::OddLength { len });
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_scratch_len()
            .max(inverse.get_scratch_len());
        Ok(Self {
            len,
            scale: 1.0 / len as f32,
            forward,
            inverse,
            time: vec![0.0; len],
            spectrum: vec![Complex::new(0.0, 0.0); len / 2 + 1],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }
}

impl Transform for RealFft {
    fn len(&self) -> usize {
        self.len
    }

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), self.len);
        assert_eq!(output.len(), self.len);
        // realfft uses its input as workspace.
        self.time.copy_from_slice(input);
        self.forward
            .process_with_scratch(&mut self.time, &mut self.spectrum, &mut self.scratch)
            .expect("buffer lengths are fixed by the plan");
        pack(&self.spectrum, self.scale, output);
    }

    fn inverse(&mut self, input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), self.len);
        assert_eq!(output.len(), self.len);
        unpack(input, &mut self.spectrum);
        self.inverse
            .process_with_scratch(&mut self.spectrum, output, &mut self.scratch)
            .expect("buffer lengths are fixed by the plan and edge bins are real");
    }
}
