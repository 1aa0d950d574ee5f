//! CPAL backend for real input devices.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, BuildStreamError, Device, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedStreamConfig, SupportedStreamConfigRange,
};

use super::{AudioBackend, DeviceDescriptor, InputStream};
use crate::config::CaptureFormat;
use crate::format::{downmix_into, i16_to_f32};
use crate::pipeline::{FrameHandler, StreamStatus};
use crate::DeviceError;

/// Frames downmixed per step inside the audio callback.
const SCRATCH_FRAMES: usize = 1024;

/// Backend over CPAL's default host.
///
/// Device ids are CPAL device names. Streams open at the session sample rate
/// with the device's fewest supported channels, as `f32` or `i16`; frames are
/// downmixed to mono `f32` inside the callback. A device with no config at
/// the session rate fails with [`DeviceError::UnsupportedFormat`] rather than
/// being resampled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl CpalBackend {
    fn find_device(device_id: &str) -> Result<Device, DeviceError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        for device in devices {
            if let Ok(name) = device.name() {
                if name == device_id {
                    return Ok(device);
                }
            }
        }

        Err(DeviceError::NotFound {
            id: device_id.to_string(),
        })
    }

    fn max_input_channels(device: &Device) -> u16 {
        device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl AudioBackend for CpalBackend {
    fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        Ok(devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let channels = Self::max_input_channels(&device);
                Some(DeviceDescriptor::named(name, channels))
            })
            .collect())
    }

    fn open_input(
        &self,
        device_id: &str,
        format: CaptureFormat,
        handler: FrameHandler,
    ) -> Result<Box<dyn InputStream>, DeviceError> {
        let device = Self::find_device(device_id)?;
        let ranges = device
            .supported_input_configs()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        let supported = select_input_config(ranges, format.sample_rate).ok_or_else(|| {
            DeviceError::UnsupportedFormat {
                id: device_id.to_string(),
                reason: format!("no f32 or i16 input config at {} Hz", format.sample_rate),
            }
        })?;

        let sample_format = supported.sample_format();
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        // Build stream based on sample format
        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, device_id, handler, std::convert::identity)?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, device_id, handler, i16_to_f32)?
            }
            other => {
                return Err(DeviceError::UnsupportedFormat {
                    id: device_id.to_string(),
                    reason: format!("sample format {other:?}"),
                });
            }
        };

        stream
            .play()
            .map_err(|e| DeviceError::Unavailable {
                id: device_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            device = device_id,
            sample_rate = format.sample_rate,
            device_channels = config.channels,
            sample_format = ?sample_format,
            "input stream playing"
        );

        Ok(Box::new(CpalStream {
            device_id: device_id.to_string(),
            stream,
        }))
    }
}

/// Picks the input config to open at `sample_rate`: `f32` or `i16` samples,
/// fewest channels first, `f32` before `i16` at equal channel count.
fn select_input_config<I>(ranges: I, sample_rate: u32) -> Option<SupportedStreamConfig>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    ranges
        .into_iter()
        .filter(|r| r.channels() > 0)
        .filter(|r| matches!(r.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .filter(|r| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&sample_rate))
        .min_by_key(|r| (r.channels(), r.sample_format() != SampleFormat::F32))
        .map(|r| r.with_sample_rate(SampleRate(sample_rate)))
}

fn build_stream<S>(
    device: &Device,
    config: &StreamConfig,
    device_id: &str,
    mut handler: FrameHandler,
    to_f32: fn(S) -> f32,
) -> Result<Stream, DeviceError>
where
    S: SizedSample + 'static,
{
    let channels = usize::from(config.channels.max(1));
    let mut detector = DiscontinuityDetector::new(config.sample_rate.0);
    let mut previous: Option<cpal::StreamInstant> = None;
    let mut scratch = [0.0_f32; SCRATCH_FRAMES];
    let error_device = device_id.to_string();

    device
        .build_input_stream(
            config,
            move |data: &[S], info: &cpal::InputCallbackInfo| {
                let capture = info.timestamp().capture;
                let elapsed = previous.and_then(|p| capture.duration_since(&p));
                previous = Some(capture);

                let status = detector.observe(elapsed, data.len() / channels);
                deliver_interleaved(&mut handler, data, channels, to_f32, &mut scratch, status);
            },
            move |err| {
                // Stream errors are transient from our point of view; the
                // stream keeps running until the session stops it.
                tracing::error!(device = %error_device, "Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| map_build_error(device_id, e))
}

/// Downmixes one driver block through `scratch` and hands it to `handler`.
///
/// Blocks longer than the scratch space are delivered in pieces; `status`
/// is attached to the first piece only.
fn deliver_interleaved<S: Copy>(
    handler: &mut FrameHandler,
    data: &[S],
    channels: usize,
    to_f32: fn(S) -> f32,
    scratch: &mut [f32],
    status: StreamStatus,
) {
    let step = scratch.len() * channels.max(1);
    if step == 0 {
        return;
    }

    let mut status = status;
    for block in data.chunks(step) {
        let frames = downmix_into(block, channels, to_f32, scratch);
        handler.on_frames(&scratch[..frames], status);
        status = StreamStatus::default();
    }
}

fn map_build_error(device_id: &str, err: BuildStreamError) -> DeviceError {
    match err {
        BuildStreamError::DeviceNotAvailable => DeviceError::Unavailable {
            id: device_id.to_string(),
            reason: err.to_string(),
        },
        BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
            DeviceError::UnsupportedFormat {
                id: device_id.to_string(),
                reason: err.to_string(),
            }
        }
        other => DeviceError::Backend(other.to_string()),
    }
}

/// A running CPAL input stream.
///
/// Dropping the CPAL stream stops the callback and joins the driver thread,
/// so the handler is detached by the time `close` returns.
struct CpalStream {
    device_id: String,
    stream: Stream,
}

impl InputStream for CpalStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn close(self: Box<Self>) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!(device = %self.device_id, "pause before close failed: {}", e);
        }
        drop(self);
    }
}

/// Flags gaps between consecutive input blocks as overflow.
///
/// CPAL has no per-block status, so lost input is inferred from capture
/// timestamps: if the time between two blocks exceeds the length of the
/// earlier block by more than half a block (and at least 1ms), frames were
/// dropped in between.
#[derive(Debug, Clone, Copy)]
pub struct DiscontinuityDetector {
    sample_rate: u32,
    last_block: Option<Duration>,
}

impl DiscontinuityDetector {
    /// Creates a detector for the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            last_block: None,
        }
    }

    /// Observes one block of `frames` frames captured `elapsed` after the
    /// previous block (`None` for the first block).
    pub fn observe(&mut self, elapsed: Option<Duration>, frames: usize) -> StreamStatus {
        let mut status = StreamStatus::default();

        if let (Some(elapsed), Some(expected)) = (elapsed, self.last_block) {
            let tolerance = (expected / 2).max(Duration::from_millis(1));
            if elapsed > expected + tolerance {
                status.input_overflow = true;
            }
        }

        self.last_block = Some(self.block_duration(frames));
        status
    }

    fn block_duration(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(frames as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingBuffer;
    use cpal::SupportedBufferSize;
    use ringbuf::traits::Consumer;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_select_prefers_fewest_channels() {
        let ranges = vec![
            range(2, 8_000, 96_000, SampleFormat::F32),
            range(1, 8_000, 96_000, SampleFormat::I16),
            range(6, 44_100, 44_100, SampleFormat::F32),
        ];
        let config = select_input_config(ranges, 44_100).unwrap();
        assert_eq!(config.channels(), 1);
        assert_eq!(config.sample_format(), SampleFormat::I16);
        assert_eq!(config.sample_rate(), SampleRate(44_100));
    }

    #[test]
    fn test_select_stereo_only_device() {
        let ranges = vec![
            range(2, 44_100, 48_000, SampleFormat::I16),
            range(2, 44_100, 48_000, SampleFormat::F32),
        ];
        let config = select_input_config(ranges, 44_100).unwrap();
        assert_eq!(config.channels(), 2);
        assert_eq!(config.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_select_rejects_missing_rate_and_formats() {
        assert!(select_input_config(vec![range(2, 48_000, 48_000, SampleFormat::F32)], 44_100)
            .is_none());
        assert!(select_input_config(vec![range(1, 8_000, 96_000, SampleFormat::U8)], 44_100)
            .is_none());
        assert!(select_input_config(Vec::new(), 44_100).is_none());
    }

    #[test]
    fn test_deliver_interleaved_downmixes_in_pieces() {
        let (writer, buffer) = RingBuffer::with_capacity(64);
        let (mut handler, mut events) = FrameHandler::new(writer, 4);
        let mut scratch = [0.0_f32; 4];

        // 10 stereo frames of i16 through 4-frame scratch: three pieces.
        let data: Vec<i16> = (0..10).flat_map(|_| [16384_i16, 0]).collect();
        deliver_interleaved(
            &mut handler,
            &data,
            2,
            i16_to_f32,
            &mut scratch,
            StreamStatus::OVERFLOW,
        );

        assert_eq!(buffer.total_written(), 10);
        assert_eq!(buffer.trailing_window(10), vec![0.25; 10]);

        // The status rides on the first piece only.
        let event = events.try_pop().unwrap();
        assert_eq!(event.position, 0);
        assert!(events.try_pop().is_none());
    }

    #[test]
    fn test_deliver_interleaved_mono_f32_passthrough() {
        let (writer, buffer) = RingBuffer::with_capacity(16);
        let (mut handler, _events) = FrameHandler::new(writer, 1);
        let mut scratch = [0.0_f32; SCRATCH_FRAMES];

        let data = [0.1_f32, -0.2, 0.3];
        deliver_interleaved(
            &mut handler,
            &data,
            1,
            std::convert::identity,
            &mut scratch,
            StreamStatus::default(),
        );
        assert_eq!(buffer.trailing_window(3), data.to_vec());
    }

    #[test]
    fn test_first_block_is_clean() {
        let mut detector = DiscontinuityDetector::new(44_100);
        assert!(detector.observe(None, 441).is_clean());
    }

    #[test]
    fn test_contiguous_blocks_are_clean() {
        let mut detector = DiscontinuityDetector::new(44_100);
        detector.observe(None, 441); // 10ms
        for _ in 0..10 {
            let status = detector.observe(Some(Duration::from_millis(10)), 441);
            assert!(status.is_clean());
        }
        // Scheduling jitter below half a block is tolerated.
        assert!(detector
            .observe(Some(Duration::from_micros(14_000)), 441)
            .is_clean());
    }

    #[test]
    fn test_gap_is_overflow() {
        let mut detector = DiscontinuityDetector::new(44_100);
        detector.observe(None, 441);
        let status = detector.observe(Some(Duration::from_millis(30)), 441);
        assert_eq!(status, StreamStatus::OVERFLOW);
    }

    #[test]
    fn test_map_build_error() {
        assert!(matches!(
            map_build_error("Mic1", BuildStreamError::DeviceNotAvailable),
            DeviceError::Unavailable { .. }
        ));
        assert!(matches!(
            map_build_error("Mic1", BuildStreamError::StreamConfigNotSupported),
            DeviceError::UnsupportedFormat { .. }
        ));
    }

    // Note: Device tests require actual audio hardware and are skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_cpal_devices() {
        let devices = CpalBackend.selectable_devices().unwrap();
        for device in devices {
            println!("{} ({} ch)", device.name, device.max_input_channels);
        }
    }
}
