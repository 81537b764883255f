//! Echo canceller statistics.

use quell_mdf::{EchoStats, FrameOutcome};

/// Smoothing factor of the ERLE power averages, per frame.
const ERLE_SMOOTHING: f64 = 0.05;

/// Statistics of an [`EchoCanceller`](crate::EchoCanceller).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    /// Echo Return Loss Enhancement in dB:
    /// `ERLE = 10 log10(P_capture / P_out)`, over smoothed powers.
    ///
    /// `None` until a frame with a non-silent capture was cancelled.
    pub echo_return_loss_enhancement: Option<f64>,
    /// State of the adaptive filter and the playback buffer.
    pub echo: EchoStats,
}

/// Smoothed capture and output powers.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ErleMeter {
    capture: f64,
    output: f64,
}

impl ErleMeter {
    /// Tracks cancelled frames and restarts after a divergence reset.
    pub(crate) fn observe(&mut self, outcome: FrameOutcome, capture: &[i16], output: &[i16]) {
        match outcome {
            FrameOutcome::Cancelled => self.update(capture, output),
            FrameOutcome::Reset => self.clear(),
            FrameOutcome::PassThrough => {}
        }
    }

    fn update(&mut self, capture: &[i16], output: &[i16]) {
        let mean_power = |s: &[i16]| {
            s.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>() / s.len().max(1) as f64
        };
        self.capture += ERLE_SMOOTHING * (mean_power(capture) - self.capture);
        self.output += ERLE_SMOOTHING * (mean_power(output) - self.output);
    }

    pub(crate) fn erle_db(&self) -> Option<f64> {
        // Output powers below one LSB squared count as one.
        (self.capture > 0.0).then(|| 10.0 * (self.capture / self.output.max(1.0)).log10())
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
