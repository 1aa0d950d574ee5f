//! Rolling sample history shared between the audio callback and readers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-capacity circular store of mono `f32` samples.
///
/// The buffer keeps the most recent `min(total_written, capacity)` samples.
/// Once full, every new sample overwrites the oldest retained one.
///
/// Writes go through the single [`RingWriter`] returned by
/// [`RingBuffer::with_capacity`]; any number of readers may hold the
/// `Arc<RingBuffer>` and call [`trailing_window`](Self::trailing_window).
///
/// Samples are stored as `f32` bit patterns in atomics so a reader racing the
/// writer is memory-safe. Such a read may mix samples from two different
/// writes; only readers that tolerate this (the level meter) read while a
/// writer is live. Everyone else stops the stream first.
///
/// # Example
///
/// ```
/// use rolling_capture::RingBuffer;
///
/// let (mut writer, buffer) = RingBuffer::with_capacity(4);
/// writer.push(&[1.0, 2.0, 3.0]);
/// writer.push(&[4.0, 5.0]);
///
/// assert_eq!(buffer.trailing_window(10), vec![2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(buffer.total_written(), 5);
/// ```
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    /// Absolute number of samples ever pushed. The physical write index is
    /// `written % capacity`.
    written: AtomicU64,
}

impl RingBuffer {
    /// Allocates a zeroed buffer and returns its only writer plus a shared
    /// handle for readers.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> (RingWriter, Arc<RingBuffer>) {
        let capacity = capacity.max(1);
        let slots = std::iter::repeat_with(|| AtomicU32::new(0))
            .take(capacity)
            .collect();
        let buffer = Arc::new(Self {
            slots,
            written: AtomicU64::new(0),
        });
        let writer = RingWriter {
            buffer: Arc::clone(&buffer),
        };
        (writer, buffer)
    }

    /// Maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of samples currently retained (`min(total_written, capacity)`).
    pub fn len(&self) -> usize {
        let written = self.written.load(Ordering::Acquire);
        written.min(self.slots.len() as u64) as usize
    }

    /// Returns `true` if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.written.load(Ordering::Acquire) == 0
    }

    /// Total number of samples ever pushed, including overwritten ones.
    pub fn total_written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    /// Duration of audio currently retained at the given sample rate.
    pub fn duration_available(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.len() as f64 / f64::from(sample_rate))
    }

    /// Returns the most recent `min(k, total_written, capacity)` samples,
    /// oldest first.
    ///
    /// The result is never padded: a short result means less history exists
    /// than was asked for.
    pub fn trailing_window(&self, k: usize) -> Vec<f32> {
        let written = self.written.load(Ordering::Acquire);
        let capacity = self.slots.len();
        let count = k.min(written.min(capacity as u64) as usize);
        if count == 0 {
            return Vec::new();
        }

        let start = ((written - count as u64) % capacity as u64) as usize;
        // The logical window may span the tail and then the head of the array.
        let first_len = count.min(capacity - start);
        let second_len = count - first_len;

        let mut window = Vec::with_capacity(count);
        window.extend(self.slots[start..start + first_len].iter().map(load_sample));
        window.extend(self.slots[..second_len].iter().map(load_sample));
        window
    }
}

#[inline]
fn load_sample(slot: &AtomicU32) -> f32 {
    f32::from_bits(slot.load(Ordering::Relaxed))
}

/// The single writer of a [`RingBuffer`].
///
/// Not `Clone`: one buffer has exactly one producer. The writer is moved into
/// the audio callback's [`FrameHandler`](crate::pipeline::FrameHandler).
#[derive(Debug)]
pub struct RingWriter {
    buffer: Arc<RingBuffer>,
}

impl RingWriter {
    /// Appends samples, discarding the oldest once capacity is exceeded.
    ///
    /// If `samples` is longer than the capacity, only its last `capacity`
    /// samples survive. An empty slice is a no-op.
    ///
    /// Runs in the audio callback: no allocation, no locks, and at most
    /// `capacity` slot stores.
    pub fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let slots = &self.buffer.slots;
        let capacity = slots.len();
        let written = self.buffer.written.load(Ordering::Relaxed);

        // Samples that would be overwritten within this same push are skipped.
        let skipped = samples.len().saturating_sub(capacity);
        let kept = &samples[skipped..];

        let mut index = ((written + skipped as u64) % capacity as u64) as usize;
        for &sample in kept {
            slots[index].store(sample.to_bits(), Ordering::Relaxed);
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        self.buffer
            .written
            .store(written + samples.len() as u64, Ordering::Release);
    }

    /// The buffer this writer fills.
    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }
}
