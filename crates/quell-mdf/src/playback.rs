//! Playback alignment buffer.
//!
//! Decouples "a far-end frame was played" from "a near-end frame was
//! captured". The buffer starts primed with `delay` silent frames, so the
//! far end is consumed `delay` frames after it is submitted. Frames are
//! stored interleaved, one `frame_len` block per frame.

use derive_more::Debug;

/// What [`PlaybackBuffer::push`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    Queued,
    /// Queued twice to restore the configured delay after a drain.
    AutoFilled,
    /// Dropped because no capture has happened yet.
    NotStarted,
    /// Dropped because the buffer was full.
    Overrun,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackBuffer {
    /// Interleaved samples per frame.
    frame_len: usize,
    delay: usize,
    #[debug(skip)]
    buf: Vec<i16>,
    /// Buffered samples.
    pos: usize,
    started: bool,
    pub(crate) underruns: u64,
    pub(crate) overruns: u64,
    pub(crate) discarded: u64,
    pub(crate) autofills: u64,
}

impl PlaybackBuffer {
    pub(crate) fn new(frame_len: usize, delay: usize) -> Self {
        Self {
            frame_len,
            delay,
            buf: vec![0; (delay + 1) * frame_len],
            pos: delay * frame_len,
            started: false,
            underruns: 0,
            overruns: 0,
            discarded: 0,
            autofills: 0,
        }
    }

    /// Re-primes the delay. Counters are kept.
    pub(crate) fn reset(&mut self) {
        self.buf.fill(0);
        self.pos = self.delay * self.frame_len;
        self.started = false;
    }

    pub(crate) fn start(&mut self) {
        self.started = true;
    }

    /// Buffered whole frames.
    pub(crate) fn len(&self) -> usize {
        self.pos / self.frame_len
    }

    /// The oldest buffered frame, if a whole one is available.
    pub(crate) fn front(&self) -> Option<&[i16]> {
        (self.pos >= self.frame_len).then(|| &self.buf[..self.frame_len])
    }

    /// Drops the oldest frame after it has been consumed.
    pub(crate) fn pop(&mut self) {
        debug_assert!(self.pos >= self.frame_len);
        self.buf.copy_within(self.frame_len..self.pos, 0);
        self.pos -= self.frame_len;
    }

    /// Records a capture that found no frame to align against.
    pub(crate) fn underrun(&mut self) {
        debug_assert_eq!(self.pos, 0, "whole frames only");
        self.underruns += 1;
        tracing::warn!("no playback frame available, passing capture through");
    }

    pub(crate) fn push(&mut self, frame: &[i16]) -> Pushed {
        assert_eq!(frame.len(), self.frame_len);
        if !self.started {
            self.discarded += 1;
            tracing::warn!("discarded playback frame before first capture");
            return Pushed::NotStarted;
        }
        if self.pos > self.delay * self.frame_len {
            self.overruns += 1;
            tracing::warn!("playback buffer full, discarding frame");
            return Pushed::Overrun;
        }
        self.append(frame);
        if self.delay > 0 && self.pos <= (self.delay - 1) * self.frame_len {
            self.append(frame);
            self.autofills += 1;
            tracing::warn!("playback buffer drained, auto-filling");
            return Pushed::AutoFilled;
        }
        Pushed::Queued
    }

    fn append(&mut self, frame: &[i16]) {
        self.buf[self.pos..self.pos + self.frame_len].copy_from_slice(frame);
        self.pos += self.frame_len;
    }
}
