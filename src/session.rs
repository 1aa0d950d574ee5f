//! Audio session lifecycle: start, stop, and the capture bracket.

use std::sync::Arc;
use std::time::Duration;

use crate::capture::{CaptureInfo, CapturePause, CaptureRequest};
use crate::event::{event_callback, EventCallback};
use crate::meter::{LevelMeter, LevelReading};
use crate::pipeline::{FrameHandler, MonitorHandle, RingBuffer, SessionMonitor};
use crate::source::{AudioBackend, CpalBackend, InputStream};
use crate::{CaptureError, SessionConfig, SessionEvent, StartError};

/// Whether a session currently owns a running input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream, no buffer.
    Idle,
    /// A stream is feeding the session's ring buffer.
    Listening,
}

/// Result of [`AudioSession::stop()`]. Stopping never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The stream on this device was closed.
    Stopped {
        /// Device the stream was bound to.
        device_id: String,
    },
    /// No session was active; nothing happened.
    NotActive,
}

/// Everything owned while listening.
struct ActiveStream {
    device_id: String,
    stream: Box<dyn InputStream>,
    buffer: Arc<RingBuffer>,
    monitor: Option<MonitorHandle>,
}

impl ActiveStream {
    /// Detaches the producer, then lets the monitor drain and exit.
    fn close(self) -> (String, Arc<RingBuffer>) {
        self.stream.close();
        if let Some(monitor) = self.monitor {
            monitor.cancel();
        }
        (self.device_id, self.buffer)
    }
}

/// Owner of one input stream and its rolling buffer.
///
/// The session is a two-state machine (`Idle` ↔ `Listening`). Every
/// transition goes through its methods; front ends hold the session and call
/// [`start`](Self::start), [`stop`](Self::stop) and [`export`](Self::export).
///
/// # Lifecycle
///
/// 1. [`start()`](Self::start) allocates a fresh buffer and opens the device
/// 2. The backend's callback fills the buffer; a monitor task logs driver
///    status and publishes levels
/// 3. [`export()`](Self::export) stops the stream, writes the trailing window,
///    and starts the stream again on the same device
/// 4. [`stop()`](Self::stop) closes the stream and releases the buffer
///
/// `start` must be called from within a Tokio runtime for the monitor task to
/// run. The session is not `Send` when backed by CPAL, since CPAL streams are
/// tied to the thread that created them.
///
/// # Example
///
/// ```no_run
/// use rolling_capture::{AudioSession, CaptureRequest, SessionConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = AudioSession::cpal(SessionConfig::default())
///     .on_event(|e| tracing::info!(?e, "session event"));
///
/// session.start("MacBook Pro Microphone")?;
/// tokio::time::sleep(std::time::Duration::from_secs(30)).await;
///
/// let info = session.export(CaptureRequest::new("last_10s.wav", 10)).await?;
/// println!("saved {} samples to {}", info.samples, info.path.display());
///
/// session.stop();
/// # Ok(())
/// # }
/// ```
pub struct AudioSession {
    backend: Arc<dyn AudioBackend>,
    config: SessionConfig,
    meter: LevelMeter,
    active: Option<ActiveStream>,
    event_callback: Option<EventCallback>,
}

impl AudioSession {
    /// Creates an idle session on the given backend.
    pub fn new<B: AudioBackend + 'static>(backend: B, config: SessionConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Creates an idle session on a shared backend.
    pub fn with_backend(backend: Arc<dyn AudioBackend>, config: SessionConfig) -> Self {
        let meter = LevelMeter::new(config.meter_window);
        Self {
            backend,
            config,
            meter,
            active: None,
            event_callback: None,
        }
    }

    /// Creates an idle session on CPAL's default host.
    pub fn cpal(config: SessionConfig) -> Self {
        Self::new(CpalBackend, config)
    }

    /// Set a callback to receive session events.
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backend streams are opened on.
    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Listening
        } else {
            SessionState::Idle
        }
    }

    /// Returns `true` while a stream is running.
    pub fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    /// Device of the running stream.
    pub fn device_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.device_id.as_str())
    }

    /// The live buffer, while listening.
    ///
    /// Reads race the producer; see [`RingBuffer`] for what that means.
    pub fn buffer(&self) -> Option<&Arc<RingBuffer>> {
        self.active.as_ref().map(|a| &a.buffer)
    }

    /// How much audio the live buffer holds. Zero when idle.
    pub fn buffered_duration(&self) -> Duration {
        self.buffer().map_or(Duration::ZERO, |b| {
            b.duration_available(self.config.sample_rate)
        })
    }

    /// Opens `device_id` and starts filling a fresh buffer.
    ///
    /// # Errors
    ///
    /// - [`StartError::AlreadyActive`] if a stream is running; it is left as is
    /// - [`StartError::Device`] if the backend cannot open the device; the
    ///   session stays idle
    pub fn start(&mut self, device_id: &str) -> Result<(), StartError> {
        if let Some(active) = &self.active {
            tracing::warn!(
                device = %active.device_id,
                requested = device_id,
                "start ignored: listening is already active"
            );
            return Err(StartError::AlreadyActive {
                device_id: active.device_id.clone(),
            });
        }

        let (writer, buffer) = RingBuffer::with_capacity(self.config.capacity_samples());
        let (handler, events) = FrameHandler::new(writer, self.config.event_queue_capacity);

        let stream = match self
            .backend
            .open_input(device_id, self.config.format(), handler)
        {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(device = device_id, "Error starting listening: {}", e);
                return Err(e.into());
            }
        };

        let monitor = SessionMonitor::new(
            device_id,
            Arc::downgrade(&buffer),
            events,
            self.meter,
            self.config.meter_interval,
            self.event_callback.clone(),
        )
        .spawn();

        self.active = Some(ActiveStream {
            device_id: device_id.to_string(),
            stream,
            buffer,
            monitor,
        });

        tracing::info!(
            device = device_id,
            sample_rate = self.config.sample_rate,
            max_seconds = self.config.max_seconds,
            "Listening has started"
        );
        self.emit(SessionEvent::ListeningStarted {
            device_id: device_id.to_string(),
        });
        Ok(())
    }

    /// Closes the running stream and releases its buffer.
    ///
    /// When this returns, the audio callback will not write again. Calling it
    /// while idle is a reported no-op.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(active) = self.active.take() else {
            tracing::warn!("No listening session is currently active");
            self.emit(SessionEvent::NoActiveSession);
            return StopOutcome::NotActive;
        };

        let (device_id, buffer) = active.close();
        drop(buffer);

        tracing::info!(device = %device_id, "Listening has stopped");
        self.emit(SessionEvent::ListeningStopped {
            device_id: device_id.clone(),
        });
        StopOutcome::Stopped { device_id }
    }

    /// RMS amplitude of the most recent samples; `0.0` when idle.
    pub fn current_amplitude(&self) -> f32 {
        self.level().rms
    }

    /// RMS and peak of the most recent samples; silence when idle.
    pub fn level(&self) -> LevelReading {
        self.meter.measure(self.buffer().map(Arc::as_ref))
    }

    /// Stops the stream so a capture can read a stable snapshot.
    ///
    /// The returned guard resumes listening on the same device when it is
    /// consumed by [`CapturePause::export`] or [`CapturePause::cancel`], or
    /// dropped. Use this when the capture parameters are chosen after
    /// pausing (for example, prompting the user for a file name).
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NotListening`] when idle; nothing is touched.
    pub fn pause_for_capture(&mut self) -> Result<CapturePause<'_>, CaptureError> {
        let Some(active) = self.active.take() else {
            tracing::error!("Capture requested but listening has not started");
            self.emit(SessionEvent::CaptureFailed {
                reason: CaptureError::NotListening.to_string(),
            });
            return Err(CaptureError::NotListening);
        };

        tracing::info!(device = %active.device_id, "Pausing listening for capture");
        let (device_id, buffer) = active.close();
        self.emit(SessionEvent::CapturePaused {
            device_id: device_id.clone(),
        });

        Ok(CapturePause::new(self, device_id, buffer))
    }

    /// Writes the trailing `request.duration_secs` seconds to `request.path`.
    ///
    /// The stream is stopped for the duration of the export and restarted on
    /// the same device afterwards, whether or not the export succeeded. The
    /// restarted stream fills a fresh buffer.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::NotListening`] when idle; no file is written
    /// - [`CaptureError::InvalidDuration`] outside `1..=max_seconds`; no file
    /// - [`CaptureError::Io`] if writing fails
    pub async fn export(&mut self, request: CaptureRequest) -> Result<CaptureInfo, CaptureError> {
        self.pause_for_capture()?.export(request).await
    }

    /// Restarts listening after a capture. Failure leaves the session idle.
    pub(crate) fn resume_after_capture(&mut self, device_id: &str) {
        tracing::info!(device = device_id, "Resuming listening");
        if let Err(e) = self.start(device_id) {
            tracing::error!(device = device_id, "Could not resume listening: {}", e);
            self.emit(SessionEvent::ResumeFailed {
                device_id: device_id.to_string(),
                reason: e.to_string(),
            });
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            // Session dropped without explicit stop() - detach the producer now.
            let (device_id, _) = active.close();
            tracing::debug!(device = %device_id, "session dropped while listening");
        }
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("state", &self.state())
            .field("device_id", &self.device_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
