//! Live amplitude readings for visualization.

use crate::RingBuffer;

/// Effective silence floor for 16-bit audio in dB.
pub const SILENCE_FLOOR_DB: f32 = -96.0;

/// One amplitude measurement over the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelReading {
    /// Root-mean-square amplitude, 0.0 to 1.0 for in-range input.
    pub rms: f32,
    /// Largest absolute sample in the window.
    pub peak: f32,
}

impl LevelReading {
    /// RMS level in dB relative to full scale, floored at [`SILENCE_FLOOR_DB`].
    pub fn dbfs(&self) -> f32 {
        if self.rms > 0.0 {
            (20.0 * self.rms.log10()).max(SILENCE_FLOOR_DB)
        } else {
            SILENCE_FLOOR_DB
        }
    }
}

/// Read-only RMS meter over the most recent samples of a [`RingBuffer`].
///
/// Stateless between calls. It may read while the producer is writing, so a
/// reading can mix a few samples from adjacent blocks; it is for display only.
#[derive(Debug, Clone, Copy)]
pub struct LevelMeter {
    window: usize,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl LevelMeter {
    /// Creates a meter averaging over the last `window` samples.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Number of samples averaged.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Measures the trailing window. A missing or empty buffer reads as silence.
    pub fn measure(&self, buffer: Option<&RingBuffer>) -> LevelReading {
        let Some(buffer) = buffer else {
            return LevelReading::default();
        };
        measure_samples(&buffer.trailing_window(self.window))
    }

    /// RMS amplitude of the trailing window.
    pub fn rms(&self, buffer: Option<&RingBuffer>) -> f32 {
        self.measure(buffer).rms
    }
}

fn measure_samples(samples: &[f32]) -> LevelReading {
    if samples.is_empty() {
        return LevelReading::default();
    }

    let mut sum_squares = 0.0f64;
    let mut peak = 0.0f32;
    for &s in samples {
        sum_squares += f64::from(s) * f64::from(s);
        peak = peak.max(s.abs());
    }

    LevelReading {
        rms: (sum_squares / samples.len() as f64).sqrt() as f32,
        peak,
    }
}
