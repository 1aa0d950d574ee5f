//! Mock backend for testing without hardware.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioBackend, DeviceDescriptor, InputStream};
use crate::config::CaptureFormat;
use crate::pipeline::{FrameHandler, StreamStatus};
use crate::DeviceError;

/// A backend that plays the role of the audio driver in tests.
///
/// It exposes a fixed device list. Opening a device parks the
/// [`FrameHandler`] in the backend; the test then delivers blocks with
/// [`deliver`](Self::deliver) the way a driver callback would. Closing the
/// stream removes the handler, after which deliveries are rejected.
///
/// Cloning yields another handle to the same backend, so a test can keep one
/// while the session owns the other.
///
/// # Example
///
/// ```
/// use rolling_capture::source::{sine_wave, MockBackend};
/// use rolling_capture::{AudioSession, SessionConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::new(["Mic1"]);
/// let mut session = AudioSession::new(backend.clone(), SessionConfig::default());
///
/// session.start("Mic1").unwrap();
/// backend.deliver_blocks(&sine_wave(440.0, 44_100, 44_100), 512);
/// assert!(session.buffered_duration().as_secs_f64() > 0.99);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceDescriptor>,
    busy: Mutex<HashSet<String>>,
    active: Mutex<Option<ActiveMock>>,
    opened: Mutex<Vec<(String, CaptureFormat)>>,
}

#[derive(Debug)]
struct ActiveMock {
    device_id: String,
    handler: FrameHandler,
}

impl MockBackend {
    /// Creates a backend exposing mono devices with the given names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_devices(
            names
                .into_iter()
                .map(|name| DeviceDescriptor::named(name, 1))
                .collect(),
        )
    }

    /// Creates a backend exposing exactly these descriptors.
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            inner: Arc::new(MockState {
                devices,
                ..MockState::default()
            }),
        }
    }

    /// Marks a device as held by another application; opening it fails.
    pub fn set_busy(&self, device_id: &str, busy: bool) {
        let mut set = self.inner.busy.lock();
        if busy {
            set.insert(device_id.to_string());
        } else {
            set.remove(device_id);
        }
    }

    /// Delivers one block to the open stream, as a driver callback would.
    ///
    /// Returns `false` if no stream is open.
    pub fn deliver(&self, samples: &[f32], status: StreamStatus) -> bool {
        match self.inner.active.lock().as_mut() {
            Some(active) => {
                active.handler.on_frames(samples, status);
                true
            }
            None => false,
        }
    }

    /// Delivers `samples` in blocks of `block` frames with a clean status.
    ///
    /// Returns `false` if no stream is open.
    pub fn deliver_blocks(&self, samples: &[f32], block: usize) -> bool {
        samples
            .chunks(block.max(1))
            .all(|chunk| self.deliver(chunk, StreamStatus::default()))
    }

    /// Returns `true` while a stream is open.
    pub fn is_streaming(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Device of the open stream, if any.
    pub fn active_device(&self) -> Option<String> {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|active| active.device_id.clone())
    }

    /// Every successful open so far, in order.
    pub fn open_history(&self) -> Vec<(String, CaptureFormat)> {
        self.inner.opened.lock().clone()
    }
}

impl AudioBackend for MockBackend {
    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(self.inner.devices.clone())
    }

    fn open_input(
        &self,
        device_id: &str,
        format: CaptureFormat,
        handler: FrameHandler,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        let known = self
            .inner
            .devices
            .iter()
            .any(|d| d.id == device_id && d.max_input_channels > 0);
        if !known {
            return Err(DeviceError::NotFound {
                id: device_id.to_string(),
            });
        }

        if self.inner.busy.lock().contains(device_id) {
            return Err(DeviceError::Unavailable {
                id: device_id.to_string(),
                reason: "device busy".to_string(),
            });
        }

        let mut active = self.inner.active.lock();
        if let Some(current) = active.as_ref() {
            return Err(DeviceError::Unavailable {
                id: device_id.to_string(),
                reason: format!("backend already streaming from {}", current.device_id),
            });
        }
        *active = Some(ActiveMock {
            device_id: device_id.to_string(),
            handler,
        });
        self.inner
            .opened
            .lock()
            .push((device_id.to_string(), format));

        Ok(Box::new(MockStream {
            device_id: device_id.to_string(),
            state: Arc::clone(&self.inner),
        }))
    }
}

struct MockStream {
    device_id: String,
    state: Arc<MockState>,
}

impl InputStream for MockStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        // Taking the lock waits out any delivery in progress.
        self.state.active.lock().take();
    }
}

/// Generates `len` samples of a sine wave with amplitude 0.8.
pub fn sine_wave(frequency: f64, sample_rate: u32, len: usize) -> Vec<f32> {
    let sample_rate = f64::from(sample_rate);
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (0.8 * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingBuffer;

    fn handler(capacity: usize) -> (FrameHandler, Arc<RingBuffer>) {
        let (writer, buffer) = RingBuffer::with_capacity(capacity);
        let (handler, _events) = FrameHandler::new(writer, 4);
        (handler, buffer)
    }

    #[test]
    fn test_deliver_reaches_buffer() {
        let backend = MockBackend::new(["Mic1"]);
        let (handler, buffer) = handler(16);

        let stream = backend
            .open_input("Mic1", CaptureFormat::default(), handler)
            .unwrap();
        assert!(backend.deliver(&[0.1, 0.2], StreamStatus::default()));
        assert_eq!(buffer.trailing_window(2), vec![0.1, 0.2]);
        assert_eq!(stream.device_id(), "Mic1");

        stream.close();
        assert!(!backend.is_streaming());
        assert!(!backend.deliver(&[0.3], StreamStatus::default()));
        assert_eq!(buffer.total_written(), 2);
    }

    #[test]
    fn test_unknown_device() {
        let backend = MockBackend::new(["Mic1"]);
        let (handler, _) = handler(4);
        let err = backend
            .open_input("Mic2", CaptureFormat::default(), handler)
            .err()
            .unwrap();
        assert_eq!(err, DeviceError::NotFound { id: "Mic2".into() });
    }

    #[test]
    fn test_busy_device() {
        let backend = MockBackend::new(["Mic1"]);
        backend.set_busy("Mic1", true);
        let (handler, _) = handler(4);
        let result = backend.open_input("Mic1", CaptureFormat::default(), handler);
        assert!(matches!(result, Err(DeviceError::Unavailable { .. })));
        assert!(backend.open_history().is_empty());
    }

    #[test]
    fn test_sine_wave() {
        let samples = sine_wave(440.0, 44_100, 4410);
        assert_eq!(samples.len(), 4410);
        assert!(samples.iter().any(|&s| s > 0.5));
        assert!(samples.iter().any(|&s| s < -0.5));
        assert!(samples.iter().all(|s| s.abs() <= 0.8));
    }
}
