//! Audio input backends and the device catalog.
//!
//! An [`AudioBackend`] enumerates input devices and opens one input stream
//! bound to a [`FrameHandler`]. Two backends ship with the crate:
//!
//! - [`CpalBackend`]: real hardware through CPAL's default host
//! - [`MockBackend`]: no hardware; tests push frames by hand

mod device;
mod mock;

pub use device::{CpalBackend, DiscontinuityDetector};
pub use mock::{sine_wave, MockBackend};

use crate::config::CaptureFormat;
use crate::pipeline::FrameHandler;
use crate::DeviceError;

/// Device name Windows reports for its input alias; it is not a real endpoint.
const SOUND_MAPPER_ALIAS: &str = "Microsoft Sound Mapper - Input";

/// An input-capable audio endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Identifier passed to [`AudioSession::start()`](crate::AudioSession::start).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Highest channel count the device can capture.
    pub max_input_channels: u16,
}

impl DeviceDescriptor {
    /// Creates a descriptor whose id is its name.
    pub fn named(name: impl Into<String>, max_input_channels: u16) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            max_input_channels,
        }
    }

    /// Whether the catalog should offer this device.
    pub fn is_selectable(&self) -> bool {
        self.max_input_channels > 0 && !self.name.contains(SOUND_MAPPER_ALIAS)
    }
}

/// A running input stream.
///
/// The stream feeds its [`FrameHandler`] until closed. Closing must detach the
/// handler synchronously: once [`close`](Self::close) returns, the handler is
/// never called again. Dropping the stream has the same effect.
pub trait InputStream {
    /// Id of the device this stream reads from.
    fn device_id(&self) -> &str;

    /// Stops the stream and releases the device.
    fn close(self: Box<Self>) {}
}

/// Source of input devices and streams.
pub trait AudioBackend: Send + Sync {
    /// Lists all input devices the backend can see, unfiltered.
    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError>;

    /// Opens and starts an input stream on `device_id` in `format`, delivering
    /// every block to `handler`.
    fn open_input(
        &self,
        device_id: &str,
        format: CaptureFormat,
        handler: FrameHandler,
    ) -> Result<Box<dyn InputStream>, DeviceError>;

    /// Lists the devices a user may pick: at least one input channel, no
    /// system aliases.
    fn selectable_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(self
            .input_devices()?
            .into_iter()
            .filter(DeviceDescriptor::is_selectable)
            .collect())
    }
}

/// Lists the selectable input devices of the default CPAL host.
///
/// # Errors
///
/// Returns an error if the audio host cannot be accessed.
pub fn list_input_devices() -> Result<Vec<DeviceDescriptor>, DeviceError> {
    CpalBackend.selectable_devices()
}

/// Gets the name of the default input device, if any.
pub fn default_input_device_name() -> Option<String> {
    use cpal::traits::{DeviceTrait, HostTrait};

    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}
