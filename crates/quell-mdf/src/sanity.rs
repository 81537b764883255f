//! Divergence watchdog.

use crate::scalar::Scalar;

/// Energies of one processed frame, summed over channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameEnergies<T> {
    /// Foreground residual.
    pub(crate) sff: T,
    /// Background residual.
    pub(crate) see: T,
    /// Background echo estimate.
    pub(crate) syy: T,
    /// Pre-emphasized far end.
    pub(crate) sxx: T,
    /// Pre-emphasized near end.
    pub(crate) sdd: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Healthy,
    /// The output carries much more energy than the input.
    Suspect,
    /// An energy is negative, not a number, or beyond any plausible level.
    Corrupt,
}

impl<T: Scalar> FrameEnergies<T> {
    pub(crate) fn verdict(&self, window_size: usize) -> Verdict {
        let n = T::from_f32(window_size as f32);
        let ceiling = n * T::from_f32(1e9);
        let tracked = [self.sff, self.see, self.syy, self.sxx];
        // Written so that NaN fails both checks.
        let non_negative = tracked.iter().all(|&v| v >= T::ZERO);
        let bounded = tracked.iter().all(|&v| v < ceiling);
        if !(non_negative && bounded) {
            Verdict::Corrupt
        } else if self.sff > self.sdd + n * T::from_f32(10_000.0) {
            Verdict::Suspect
        } else {
            Verdict::Healthy
        }
    }
}

/// Counts consecutive anomalous frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Watchdog {
    screwed_up: u32,
}

impl Watchdog {
    /// Records a frame and reports whether the state must be reset.
    ///
    /// A corrupt frame counts as `threshold` anomalies at once.
    pub(crate) fn observe(&mut self, verdict: Verdict, threshold: u32) -> bool {
        self.screwed_up = match verdict {
            Verdict::Healthy => 0,
            Verdict::Suspect => self.screwed_up.saturating_add(1),
            Verdict::Corrupt => self.screwed_up.saturating_add(threshold),
        };
        self.screwed_up >= threshold
    }

    pub(crate) fn count(&self) -> u32 {
        self.screwed_up
    }

    pub(crate) fn clear(&mut self) {
        self.screwed_up = 0;
    }
}
