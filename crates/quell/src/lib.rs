#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod config;
mod convert;
mod echo_canceller;
pub mod stats;

pub use config::Config;
pub use echo_canceller::{EchoCanceller, EchoCancellerBuilder, Error};
pub use stats::Stats;

pub use quell_mdf::{EchoStats, FrameOutcome, MdfCanceller, PseudoFloat, Scalar, Tuning};
