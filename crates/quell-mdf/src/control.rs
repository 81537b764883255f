//! Parameter get/set and impulse response introspection.

use crate::canceller::MdfCanceller;
use crate::config::{MdfConfig, check_sample_rate};
use crate::echo_state::EchoState;
use crate::error::ConfigError;
use crate::playback::PlaybackBuffer;
use crate::scalar::Scalar;

impl<T: Scalar> MdfCanceller<T> {
    pub fn sampling_rate(&self) -> u32 {
        self.state.sample_rate
    }

    /// Sets the sampling rate and recomputes the smoothing constants and
    /// the DC notch radius. Allowed at any time.
    pub fn set_sampling_rate(&mut self, sample_rate: u32) -> Result<(), ConfigError> {
        check_sample_rate(sample_rate)?;
        tracing::debug!(sample_rate, "setting sampling rate");
        self.config.sample_rate = sample_rate;
        self.state.set_sampling_rate(sample_rate);
        Ok(())
    }

    pub fn frame_size(&self) -> usize {
        self.state.frame_size
    }

    /// Configured filter length in samples.
    pub fn filter_length(&self) -> usize {
        self.state.filter_length
    }

    pub fn num_mics(&self) -> usize {
        self.state.mics
    }

    pub fn num_speakers(&self) -> usize {
        self.state.speakers
    }

    /// Changes the filter length. Rejected once a frame was processed.
    pub fn set_filter_length(&mut self, filter_length: usize) -> Result<(), ConfigError> {
        self.reconfigure(MdfConfig {
            filter_length,
            ..self.config
        })
    }

    /// Changes the channel counts. Rejected once a frame was processed.
    pub fn set_channels(&mut self, num_mics: usize, num_speakers: usize) -> Result<(), ConfigError> {
        self.reconfigure(MdfConfig {
            num_mics,
            num_speakers,
            ..self.config
        })
    }

    fn reconfigure(&mut self, config: MdfConfig) -> Result<(), ConfigError> {
        if self.started {
            tracing::warn!("rejected filter or channel change after processing started");
            return Err(ConfigError::AlreadyStarted);
        }
        config.validate()?;
        tracing::debug!(
            filter_length = config.filter_length,
            mics = config.num_mics,
            speakers = config.num_speakers,
            "reconfiguring echo canceller"
        );
        self.state = EchoState::new(&config);
        self.playback = PlaybackBuffer::new(
            config.frame_size * config.num_speakers,
            config.playback_delay_frames,
        );
        self.config = config;
        Ok(())
    }

    /// Number of taps returned by [`impulse_response`](Self::impulse_response).
    pub fn impulse_response_len(&self) -> usize {
        self.state.blocks * self.state.frame_size
    }

    /// Learned echo path from speaker 0 to mic 0 in Q15 (`32767 * h`).
    pub fn impulse_response(&mut self, out: &mut [i32]) {
        self.impulse_response_for(0, 0, out);
    }

    /// Learned echo path from `speaker` to `mic` in Q15 (`32767 * h`).
    ///
    /// # Panics
    ///
    /// If `mic` or `speaker` is out of range, or `out` is not
    /// [`impulse_response_len`](Self::impulse_response_len) long.
    pub fn impulse_response_for(&mut self, mic: usize, speaker: usize, out: &mut [i32]) {
        self.state
            .impulse_response(self.transform.as_mut(), mic, speaker, out);
    }
}
