//! # rolling-capture
//!
//! Rolling-buffer audio capture: always keep the last few minutes of input,
//! save any trailing window as a WAV file after the fact.
//!
//! An [`AudioSession`] opens one input device and writes every delivered
//! block into a fixed-size [`RingBuffer`] (300 s at 44.1kHz mono by default).
//! When something worth keeping happens, [`AudioSession::export`] writes the
//! last N seconds as 16-bit PCM and carries on listening.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rolling_capture::{AudioSession, CaptureRequest, SessionConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = AudioSession::cpal(SessionConfig::default())
//!     .on_event(|e| tracing::debug!(?e, "session event"));
//!
//! session.start("USB Microphone")?;
//!
//! // ... later
//! let info = session.export(CaptureRequest::new("that_was_good.wav", 30)).await?;
//! println!("wrote {:.1}s", info.duration().as_secs_f64());
//!
//! session.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Audio callback**: copies each block into the ring buffer and queues
//!   driver status flags. It never blocks, allocates, or logs
//! - **Ring buffer**: single writer, lock-free readers; the level meter reads
//!   it live, the exporter reads it only after the stream is closed
//! - **Tokio runtime**: a monitor task logs driver status and publishes
//!   levels; WAV writing runs on the blocking pool
//!
//! Backends sit behind [`source::AudioBackend`]. [`source::CpalBackend`] talks
//! to hardware; [`source::MockBackend`] lets tests drive the callback by hand.

// unsafe_code lint is configured in Cargo.toml as "deny"
#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod capture;
mod config;
mod error;
mod event;
pub mod format;
mod meter;
mod pipeline;
mod session;
pub mod settings;
pub mod source;

pub use capture::{CaptureInfo, CapturePause, CaptureRequest};
pub use config::{CaptureFormat, SessionConfig, MAX_SECONDS, SAMPLE_RATE};
pub use error::{CaptureError, DeviceError, SettingsError, StartError};
pub use event::{event_callback, EventCallback, SessionEvent};
pub use meter::{LevelMeter, LevelReading, SILENCE_FLOOR_DB};
pub use pipeline::{FrameHandler, ProducerEvent, RingBuffer, RingWriter, StreamStatus};
pub use session::{AudioSession, SessionState, StopOutcome};
pub use settings::Settings;
pub use source::{default_input_device_name, list_input_devices, DeviceDescriptor};
