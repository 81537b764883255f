#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod canceller;
mod config;
mod control;
mod echo_state;
mod error;
mod filters;
mod pipeline;
mod playback;
mod pseudo_float;
mod sanity;
mod scalar;
mod spectral;
mod stats;
#[cfg(test)]
mod testing;
mod two_path;

pub use canceller::MdfCanceller;
pub use config::{MAX_SAMPLE_RATE, MdfConfig, Tuning};
pub use error::ConfigError;
pub use pipeline::FrameOutcome;
pub use pseudo_float::PseudoFloat;
pub use scalar::Scalar;
pub use stats::EchoStats;

// The transform seam, so callers can supply their own.
pub use quell_fft::{RealFft, Transform, TransformError};
