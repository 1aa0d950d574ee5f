//! Configuration types for capture sessions.

use std::time::Duration;

/// Sample rate every session records at, in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Longest trailing window the buffer retains, in seconds.
pub const MAX_SECONDS: u32 = 300;

/// The fixed stream format requested from the input device.
///
/// Only mono is supported; the sample rate is fixed per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels. Always 1.
    pub channels: u16,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
        }
    }
}

/// Configuration for an [`AudioSession`](crate::AudioSession).
///
/// Use [`SessionConfig::default()`] for the standard 44.1kHz / 300 s setup.
/// Tests shrink `max_seconds` to keep buffers small.
///
/// # Example
///
/// ```
/// use rolling_capture::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig {
///     max_seconds: 30,
///     meter_interval: Duration::from_millis(100),
///     ..Default::default()
/// };
/// assert_eq!(config.capacity_samples(), 44_100 * 30);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sample rate requested from the device.
    ///
    /// Default: 44100
    pub sample_rate: u32,

    /// Length of the rolling buffer in seconds. Also the upper bound for a
    /// capture request.
    ///
    /// Default: 300
    pub max_seconds: u32,

    /// Number of trailing samples the level meter averages over.
    ///
    /// Default: 2048
    pub meter_window: usize,

    /// How often the session monitor polls the level and drains producer
    /// status records.
    ///
    /// Default: 50ms
    pub meter_interval: Duration,

    /// Capacity of the lock-free queue carrying status records out of the
    /// audio callback. Records beyond this are counted, not queued.
    ///
    /// Default: 256
    pub event_queue_capacity: usize,
}

impl SessionConfig {
    /// Stream format derived from this configuration.
    #[must_use]
    pub fn format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }

    /// Ring buffer capacity in samples (`sample_rate * max_seconds`).
    #[must_use]
    pub fn capacity_samples(&self) -> usize {
        self.sample_rate as usize * self.max_seconds as usize
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            max_seconds: MAX_SECONDS,
            meter_window: 2048,
            meter_interval: Duration::from_millis(50),
            event_queue_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.max_seconds, 300);
        assert_eq!(config.meter_window, 2048);
        assert_eq!(config.meter_interval, Duration::from_millis(50));
        assert_eq!(config.event_queue_capacity, 256);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(SessionConfig::default().capacity_samples(), 13_230_000);
    }

    #[test]
    fn test_format_is_mono() {
        let format = SessionConfig::default().format();
        assert_eq!(format, CaptureFormat::default());
        assert_eq!(format.channels, 1);
    }
}
