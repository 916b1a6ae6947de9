//! Bounded byte buffer shared between the feeder and the output sink

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sndstrm_core::PcmFormat;
use thiserror::Error;

/// Longest buffer `for_duration` will size, in seconds of audio.
pub const MAX_BUFFER_SECS: f32 = 60.0;

#[derive(Debug, Error)]
pub enum PlaybackBufferError {
    #[error("Buffer full: {requested} bytes requested, {free} free")]
    Overflow { requested: usize, free: usize },
}

/// Append side of a bounded playback buffer. The feeder only ever appends
/// and queries fill level; draining belongs to the consumer.
pub trait ByteSink {
    fn capacity(&self) -> usize;
    fn buffered_bytes(&self) -> usize;
    fn append(&self, bytes: &[u8]) -> Result<(), PlaybackBufferError>;

    fn free_space(&self) -> usize {
        self.capacity().saturating_sub(self.buffered_bytes())
    }
}

impl<T: ByteSink + ?Sized> ByteSink for Arc<T> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn buffered_bytes(&self) -> usize {
        (**self).buffered_bytes()
    }

    fn append(&self, bytes: &[u8]) -> Result<(), PlaybackBufferError> {
        (**self).append(bytes)
    }
}

/// FIFO of PCM bytes with a fixed capacity. Safe for one appending thread and
/// one draining thread. Storage grows as bytes arrive; `capacity` only bounds
/// `append`.
pub struct PlaybackBuffer {
    capacity: usize,
    bytes: Mutex<VecDeque<u8>>,
}

impl PlaybackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bytes: Mutex::new(VecDeque::new()),
        }
    }

    /// Capacity for `secs` seconds of audio (at most [`MAX_BUFFER_SECS`]),
    /// rounded down to whole frames and never below one frame.
    pub fn for_duration(format: &PcmFormat, secs: f32) -> Self {
        let frame = format.bytes_per_frame().max(1) as usize;
        let secs = secs.max(0.0).min(MAX_BUFFER_SECS) as f64;
        let wanted = (format.bytes_per_second() as f64 * secs) as usize;
        Self::new((wanted / frame).max(1) * frame)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drains up to `out.len()` bytes, rounded down to a multiple of `align`.
    /// Returns the number of bytes written to `out`.
    pub fn read_aligned(&self, out: &mut [u8], align: usize) -> usize {
        let align = align.max(1);
        let mut bytes = self.lock();
        let n = out.len().min(bytes.len()) / align * align;
        for (dst, src) in out[..n].iter_mut().zip(bytes.drain(..n)) {
            *dst = src;
        }
        n
    }

    // A panic on the other side cannot leave the deque half-written.
    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ByteSink for PlaybackBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffered_bytes(&self) -> usize {
        self.lock().len()
    }

    fn append(&self, bytes: &[u8]) -> Result<(), PlaybackBufferError> {
        let mut buffered = self.lock();
        let free = self.capacity.saturating_sub(buffered.len());
        if bytes.len() > free {
            return Err(PlaybackBufferError::Overflow {
                requested: bytes.len(),
                free,
            });
        }
        buffered.extend(bytes);
        Ok(())
    }
}
