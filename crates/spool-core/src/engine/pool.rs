//! Preallocated working buffers for the audio callback

use crate::types::{StereoBuffer, StereoSample};

/// Fixed-size stereo buffers allocated once at engine construction
///
/// The callback only changes their working length (never their capacity).
pub struct BufferPool {
    player: StereoBuffer,
    reverb_in: StereoBuffer,
    reverb_out: StereoBuffer,
    max_frames: usize,
}

/// Mutable views of every pool buffer for one callback
pub struct PoolViews<'a> {
    pub player: &'a mut [StereoSample],
    pub reverb_in: &'a mut [StereoSample],
    pub reverb_out: &'a mut [StereoSample],
}

impl BufferPool {
    pub fn new(max_frames: usize) -> Self {
        Self {
            player: StereoBuffer::silence(max_frames),
            reverb_in: StereoBuffer::silence(max_frames),
            reverb_out: StereoBuffer::silence(max_frames),
            max_frames,
        }
    }

    /// Largest quantum a single render can use
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Size all buffers to `frames` and hand out views (no allocation)
    pub fn views(&mut self, frames: usize) -> PoolViews<'_> {
        let frames = frames.min(self.max_frames);
        self.player.set_len_from_capacity(frames);
        self.reverb_in.set_len_from_capacity(frames);
        self.reverb_out.set_len_from_capacity(frames);
        PoolViews {
            player: self.player.as_mut_slice(),
            reverb_in: self.reverb_in.as_mut_slice(),
            reverb_out: self.reverb_out.as_mut_slice(),
        }
    }
}
