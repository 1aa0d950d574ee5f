//! Session events for front ends.
//!
//! Events mirror what the session logs: lifecycle changes, capture results,
//! producer status and level readings. They are notifications, not errors;
//! control-flow failures are returned as typed results as well.

use std::path::PathBuf;
use std::sync::Arc;

use crate::meter::LevelReading;
use crate::pipeline::StreamStatus;

/// Notifications emitted by an [`AudioSession`](crate::AudioSession).
///
/// # Example
///
/// ```
/// use rolling_capture::SessionEvent;
///
/// fn handle_event(event: SessionEvent) {
///     match event {
///         SessionEvent::ListeningStarted { device_id } => {
///             eprintln!("listening on {device_id}");
///         }
///         SessionEvent::ProducerStatus { status, .. } => {
///             eprintln!("driver reported {status}");
///         }
///         SessionEvent::Level(reading) => {
///             eprintln!("{:.1} dBFS", reading.dbfs());
///         }
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The input stream is running and feeding a fresh buffer.
    ListeningStarted {
        /// Device the stream is bound to.
        device_id: String,
    },

    /// The input stream was closed.
    ListeningStopped {
        /// Device the stream was bound to.
        device_id: String,
    },

    /// `stop()` was called while no session was active.
    NoActiveSession,

    /// The stream was stopped so a capture can read a stable snapshot.
    CapturePaused {
        /// Device that will be resumed afterwards.
        device_id: String,
    },

    /// A capture was written.
    CaptureSaved {
        /// Path of the written file.
        path: PathBuf,
        /// Number of samples written.
        samples: usize,
    },

    /// A capture attempt failed or was cancelled; no file was written.
    CaptureFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Listening could not be resumed after a capture. The session is idle.
    ResumeFailed {
        /// Device that failed to reopen.
        device_id: String,
        /// Description of the failure.
        reason: String,
    },

    /// The driver flagged a delivered block. Capture continued.
    ProducerStatus {
        /// Device that reported the status.
        device_id: String,
        /// The reported flags.
        status: StreamStatus,
        /// Absolute sample position where the block started.
        position: u64,
        /// Earlier records lost because the status queue was full.
        missed: u64,
    },

    /// Periodic amplitude reading of the trailing window.
    Level(LevelReading),
}

/// Callback type for receiving session events.
///
/// Called from the control side only (session methods and the monitor task),
/// never from the audio callback.
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use rolling_capture::{event_callback, SessionEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(SessionEvent::NoActiveSession);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(SessionEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_event_debug() {
        let event = SessionEvent::CaptureSaved {
            path: PathBuf::from("capture.wav"),
            samples: 220_500,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("CaptureSaved"));
        assert!(debug.contains("220500"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(SessionEvent::NoActiveSession);
        assert!(called.load(Ordering::SeqCst));
    }
}
