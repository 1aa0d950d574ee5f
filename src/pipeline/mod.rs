//! Ingestion pipeline components.
//!
//! The pipeline connects the audio callback to the control side:
//!
//! ```text
//! Driver Thread → FrameHandler → RingBuffer ← {LevelMeter, Capture Exporter}
//!                     ↓
//!               status queue → SessionMonitor → tracing / SessionEvent
//! ```
//!
//! - **RingBuffer**: rolling sample history with a single writer
//! - **FrameHandler**: the only code that runs in the audio callback
//! - **SessionMonitor**: Tokio task that logs producer status and polls the level
//!
//! Nothing on the callback side blocks, allocates or takes a lock.

mod handler;
mod monitor;
mod ring_buffer;

pub use handler::{FrameHandler, ProducerEvent, StreamStatus};
pub(crate) use monitor::{MonitorHandle, SessionMonitor};
pub use ring_buffer::{RingBuffer, RingWriter};
