//! Diagnostics snapshot.

/// Counters and adaptation state of an [`MdfCanceller`](crate::MdfCanceller).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EchoStats {
    /// Frames run through the adaptive filter since construction.
    pub frames_processed: u64,
    /// Frames passed through because no far-end frame was aligned.
    pub frames_passed_through: u64,
    /// Frames processed since the last reset.
    pub frames_since_reset: u64,
    /// The filter left its initial ramp-up.
    pub adapted: bool,
    /// Estimated fraction of the echo leaking through, in `[0, 1]`.
    pub leak_estimate: f32,
    /// Cumulative adaptation confidence during ramp-up.
    pub sum_adapt: f32,
    /// Remaining frames with adaptation suspended after clipping.
    pub saturated: u32,
    /// Consecutive anomalous frames seen by the watchdog.
    pub anomalies: u32,
    /// Automatic divergence resets.
    pub divergence_resets: u64,
    /// Far-end frames currently buffered for alignment.
    pub playback_buffered: usize,
    pub playback_underruns: u64,
    pub playback_overruns: u64,
    /// Far-end frames dropped before the first capture.
    pub playback_discarded: u64,
    pub playback_autofills: u64,
}
