//! Capture export: the trailing window of the buffer as a WAV file.
//!
//! An export runs in a bracket. [`AudioSession::pause_for_capture`] stops the
//! stream and hands out a [`CapturePause`]; whatever happens next, the guard
//! restarts listening on the same device when it goes away.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::format::{quantize, write_wav_file};
use crate::session::AudioSession;
use crate::{CaptureError, RingBuffer, SessionEvent};

/// What to export and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Destination file. Created or truncated.
    pub path: PathBuf,
    /// Seconds of trailing audio to write.
    pub duration_secs: u32,
}

impl CaptureRequest {
    /// Creates a request for the last `duration_secs` seconds.
    pub fn new(path: impl Into<PathBuf>, duration_secs: u32) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }

    /// Checks the duration against `1..=max_seconds`.
    pub fn validate(&self, max_seconds: u32) -> Result<(), CaptureError> {
        if (1..=max_seconds).contains(&self.duration_secs) {
            Ok(())
        } else {
            Err(CaptureError::InvalidDuration {
                requested: self.duration_secs,
                max: max_seconds,
            })
        }
    }

    /// Number of samples the request covers at `sample_rate`.
    pub fn sample_count(&self, sample_rate: u32) -> usize {
        self.duration_secs as usize * sample_rate as usize
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInfo {
    /// Written file.
    pub path: PathBuf,
    /// Samples in the file.
    pub samples: usize,
    /// Samples the request asked for.
    pub requested_samples: usize,
    /// Sample rate of the file.
    pub sample_rate: u32,
}

impl CaptureInfo {
    /// Playback length of the file.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// `true` when the buffer held less audio than requested.
    pub fn is_partial(&self) -> bool {
        self.samples < self.requested_samples
    }
}

/// A stopped session waiting for its capture.
///
/// While the guard lives the stream is closed, so the buffer it holds is a
/// stable snapshot. Consuming it with [`export`](Self::export) or
/// [`cancel`](Self::cancel), or dropping it, restarts listening on the same
/// device with a fresh buffer. If the restart fails, the session is left idle
/// and [`SessionEvent::ResumeFailed`] is emitted.
#[must_use = "dropping the pause resumes listening immediately"]
pub struct CapturePause<'a> {
    session: &'a mut AudioSession,
    device_id: String,
    buffer: Option<Arc<RingBuffer>>,
}

impl<'a> CapturePause<'a> {
    pub(crate) fn new(
        session: &'a mut AudioSession,
        device_id: String,
        buffer: Arc<RingBuffer>,
    ) -> Self {
        Self {
            session,
            device_id,
            buffer: Some(buffer),
        }
    }

    /// Device listening will resume on.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// How much audio the paused buffer holds.
    pub fn available(&self) -> Duration {
        let sample_rate = self.session.config().sample_rate;
        self.buffer
            .as_ref()
            .map_or(Duration::ZERO, |b| b.duration_available(sample_rate))
    }

    /// Upper bound on `duration_secs` for this session.
    pub fn max_seconds(&self) -> u32 {
        self.session.config().max_seconds
    }

    /// Validates `request`, writes the trailing window, then resumes.
    ///
    /// If the buffer holds fewer samples than requested, everything it holds
    /// is written and [`CaptureInfo::is_partial`] reports it.
    pub async fn export(mut self, request: CaptureRequest) -> Result<CaptureInfo, CaptureError> {
        let result = self.write(&request).await;

        match &result {
            Ok(info) => {
                tracing::info!(
                    path = %info.path.display(),
                    samples = info.samples,
                    partial = info.is_partial(),
                    "Capture saved"
                );
                self.session.emit(SessionEvent::CaptureSaved {
                    path: info.path.clone(),
                    samples: info.samples,
                });
            }
            Err(e) => {
                tracing::error!(path = %request.path.display(), "Capture failed: {}", e);
                self.session.emit(SessionEvent::CaptureFailed {
                    reason: e.to_string(),
                });
            }
        }

        self.resume();
        result
    }

    /// Abandons the capture without writing anything, then resumes.
    pub fn cancel(mut self) {
        tracing::info!(device = %self.device_id, "Capture cancelled");
        self.session.emit(SessionEvent::CaptureFailed {
            reason: "capture cancelled".to_string(),
        });
        self.resume();
    }

    async fn write(&self, request: &CaptureRequest) -> Result<CaptureInfo, CaptureError> {
        let config = self.session.config();
        request.validate(config.max_seconds)?;

        let sample_rate = config.sample_rate;
        let requested_samples = request.sample_count(sample_rate);
        let window = self
            .buffer
            .as_ref()
            .map(|b| b.trailing_window(requested_samples))
            .unwrap_or_default();
        let pcm = quantize(&window);
        let samples = pcm.len();

        let path = request.path.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_wav_file(&target, &pcm, sample_rate, 1))
            .await
            .map_err(|e| {
                CaptureError::io(&path, io::Error::other(format!("writer task failed: {e}")))
            })?
            .map_err(|e| CaptureError::io(&path, e))?;

        Ok(CaptureInfo {
            path,
            samples,
            requested_samples,
            sample_rate,
        })
    }

    fn resume(&mut self) {
        // Release the old buffer before the new one is allocated.
        if self.buffer.take().is_some() {
            self.session.resume_after_capture(&self.device_id);
        }
    }
}

impl Drop for CapturePause<'_> {
    fn drop(&mut self) {
        self.resume();
    }
}

impl std::fmt::Debug for CapturePause<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePause")
            .field("device_id", &self.device_id)
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}
