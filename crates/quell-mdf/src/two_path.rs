//! Foreground/background switching.
//!
//! The background filter adapts every frame; the foreground filter
//! produces the audible output. Two recursive averages of the residual
//! energy difference `Sff - See` (short and long term) and their
//! variances decide when the background is confidently better
//! ([`PathDecision::Promote`]) or has diverged and must be restored from
//! the foreground ([`PathDecision::Rollback`]).

use crate::config::Tuning;
use crate::scalar::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathDecision {
    Keep,
    /// Copy background weights into the foreground.
    Promote,
    /// Copy foreground weights back into the background.
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TwoPath<T> {
    davg1: T,
    davg2: T,
    dvar1: T,
    dvar2: T,
}

impl<T: Scalar> TwoPath<T> {
    pub(crate) fn new() -> Self {
        Self {
            davg1: T::ZERO,
            davg2: T::ZERO,
            dvar1: T::ZERO,
            dvar2: T::ZERO,
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }

    /// Folds one frame of residual energies into the trackers.
    ///
    /// `sff` and `see` are the foreground and background residual
    /// energies, `dbf` the energy of the difference between the two echo
    /// estimates. The trackers are cleared whenever a copy is requested.
    pub(crate) fn update(&mut self, sff: T, see: T, dbf: T, tuning: &Tuning) -> PathDecision {
        let a1 = tuning.var1_smooth.sqrt();
        let a2 = tuning.var2_smooth.sqrt();
        let diff = sff - see;

        self.davg1 = T::from_f32(a1) * self.davg1 + T::from_f32(1.0 - a1) * diff;
        self.davg2 = T::from_f32(a2) * self.davg2 + T::from_f32(1.0 - a2) * diff;
        self.dvar1 = T::from_f32(tuning.var1_smooth) * self.dvar1
            + T::from_f32(1.0 - a1) * sff * (T::from_f32(1.0 - a1) * dbf);
        self.dvar2 = T::from_f32(tuning.var2_smooth) * self.dvar2
            + T::from_f32(1.0 - a2) * sff * (T::from_f32(1.0 - a2) * dbf);

        let signed_square = |v: T| v * v.abs();
        let gap = signed_square(diff);
        let bound = sff * dbf;
        let short = signed_square(self.davg1);
        let long = signed_square(self.davg2);

        let decision = if gap > bound
            || short > T::from_f32(tuning.var1_update) * self.dvar1
            || long > T::from_f32(tuning.var2_update) * self.dvar2
        {
            PathDecision::Promote
        } else {
            let backtrack = T::from_f32(tuning.var_backtrack);
            if -gap > backtrack * bound
                || -short > backtrack * self.dvar1
                || -long > backtrack * self.dvar2
            {
                PathDecision::Rollback
            } else {
                PathDecision::Keep
            }
        };
        if decision != PathDecision::Keep {
            self.clear();
        }
        decision
    }
}
