//! Error types for rolling-capture.
//!
//! Errors are split by the operation that returns them:
//! - [`StartError`] / [`DeviceError`]: the stream could not be started
//! - [`CaptureError`]: a trailing window could not be exported
//!
//! Faults inside the audio callback are never returned; they surface as
//! [`SessionEvent::ProducerStatus`](crate::SessionEvent::ProducerStatus).

use std::path::PathBuf;

/// The input device is missing or cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// No input device with this id exists.
    #[error("device not found: {id}")]
    NotFound {
        /// Id that was requested.
        id: String,
    },

    /// The device exists but cannot be opened right now (busy, unplugged).
    #[error("device unavailable: {id} - {reason}")]
    Unavailable {
        /// Id of the device.
        id: String,
        /// Why it could not be opened.
        reason: String,
    },

    /// The device refused the fixed capture format (mono f32 at the session rate).
    #[error("device {id} does not support the capture format: {reason}")]
    UnsupportedFormat {
        /// Id of the device.
        id: String,
        /// Backend description of the mismatch.
        reason: String,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Errors returned from [`AudioSession::start()`](crate::AudioSession::start).
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The stream could not be opened; the session stays idle.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A stream is already running. It was left untouched.
    #[error("already listening on {device_id}")]
    AlreadyActive {
        /// Device the running stream is bound to.
        device_id: String,
    },
}

/// Errors returned from a capture export.
///
/// None of these leave the session stopped: the stream is resumed before
/// the error reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No session is listening, so there is nothing to capture. No file was written.
    #[error("listening has not started")]
    NotListening,

    /// The requested duration is outside `1..=max` seconds. No file was written.
    #[error("capture duration {requested}s out of range (1-{max}s)")]
    InvalidDuration {
        /// Requested duration in seconds.
        requested: u32,
        /// Upper bound in seconds.
        max: u32,
    },

    /// Writing the WAV file failed.
    #[error("file error: {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File I/O error.
    #[error("settings file error: {path}: {source}")]
    Io {
        /// Path to the settings file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A non-empty line without a `key=value` shape.
    #[error("malformed settings line {line}: {content:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::NotFound {
            id: "USB Mic".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: USB Mic");
    }

    #[test]
    fn test_start_error_wraps_device_error() {
        let err: StartError = DeviceError::Unavailable {
            id: "Mic1".to_string(),
            reason: "busy".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "device unavailable: Mic1 - busy");
        assert!(matches!(err, StartError::Device(_)));
    }

    #[test]
    fn test_invalid_duration_display() {
        let err = CaptureError::InvalidDuration {
            requested: 400,
            max: 300,
        };
        assert_eq!(err.to_string(), "capture duration 400s out of range (1-300s)");
    }

    #[test]
    fn test_capture_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory");
        let err = CaptureError::io("/tmp/missing/capture.wav", io_err);
        assert!(err.to_string().contains("/tmp/missing/capture.wav"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
