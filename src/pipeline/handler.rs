//! The producer side of a session: what runs inside the audio callback.

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::pipeline::RingWriter;

/// Driver-reported condition attached to a delivered block of frames.
///
/// Both flags are transient: the block is still pushed into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStatus {
    /// Input data was lost before this block (driver overrun / discontinuity).
    pub input_overflow: bool,
    /// The driver delivered fewer frames than it should have.
    pub input_underflow: bool,
}

impl StreamStatus {
    /// A status with the overflow flag set.
    pub const OVERFLOW: Self = Self {
        input_overflow: true,
        input_underflow: false,
    };

    /// A status with the underflow flag set.
    pub const UNDERFLOW: Self = Self {
        input_overflow: false,
        input_underflow: true,
    };

    /// Returns `true` if no flag is set.
    pub fn is_clean(&self) -> bool {
        !self.input_overflow && !self.input_underflow
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.input_overflow, self.input_underflow) {
            (false, false) => write!(f, "ok"),
            (true, false) => write!(f, "input overflow"),
            (false, true) => write!(f, "input underflow"),
            (true, true) => write!(f, "input overflow, input underflow"),
        }
    }
}

/// A record the audio callback hands to the control side.
///
/// Plain `Copy` data so queueing it never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerEvent {
    /// The status reported with the block.
    pub status: StreamStatus,
    /// Absolute sample position of the block's first frame.
    pub position: u64,
    /// Records that could not be queued since the last one that was.
    pub missed: u64,
}

/// Producer handler bound to one input stream.
///
/// Owns the session buffer's only [`RingWriter`] and the producing half of a
/// lock-free status queue. Backends call [`on_frames`](Self::on_frames) for
/// every block the driver delivers; nothing else holds the writer.
pub struct FrameHandler {
    writer: RingWriter,
    events: ringbuf::HeapProd<ProducerEvent>,
    missed: u64,
}

impl FrameHandler {
    /// Creates a handler and the consumer end of its status queue.
    ///
    /// `queue_capacity` is raised to one if zero.
    pub fn new(
        writer: RingWriter,
        queue_capacity: usize,
    ) -> (Self, ringbuf::HeapCons<ProducerEvent>) {
        let queue = HeapRb::<ProducerEvent>::new(queue_capacity.max(1));
        let (events, consumer) = queue.split();
        (
            Self {
                writer,
                events,
                missed: 0,
            },
            consumer,
        )
    }

    /// Consumes one delivered block.
    ///
    /// A non-clean status is queued for the control side and the frames are
    /// pushed anyway. Never blocks, never allocates, never fails.
    pub fn on_frames(&mut self, samples: &[f32], status: StreamStatus) {
        if !status.is_clean() {
            let event = ProducerEvent {
                status,
                position: self.writer.buffer().total_written(),
                missed: self.missed,
            };
            if self.events.try_push(event).is_ok() {
                self.missed = 0;
            } else {
                self.missed += 1;
            }
        }

        self.writer.push(samples);
    }

    /// Total samples this handler's buffer has received.
    pub fn samples_written(&self) -> u64 {
        self.writer.buffer().total_written()
    }
}

impl std::fmt::Debug for FrameHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandler")
            .field("samples_written", &self.samples_written())
            .field("missed", &self.missed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingBuffer;
    use ringbuf::traits::Consumer;

    #[test]
    fn test_clean_blocks_queue_nothing() {
        let (writer, buffer) = RingBuffer::with_capacity(16);
        let (mut handler, mut events) = FrameHandler::new(writer, 4);

        handler.on_frames(&[0.1, 0.2], StreamStatus::default());
        handler.on_frames(&[0.3], StreamStatus::default());

        assert_eq!(buffer.trailing_window(16), vec![0.1, 0.2, 0.3]);
        assert!(events.try_pop().is_none());
    }

    #[test]
    fn test_status_is_queued_and_frames_still_pushed() {
        let (writer, buffer) = RingBuffer::with_capacity(16);
        let (mut handler, mut events) = FrameHandler::new(writer, 4);

        handler.on_frames(&[0.5; 4], StreamStatus::default());
        handler.on_frames(&[0.25; 2], StreamStatus::OVERFLOW);

        assert_eq!(buffer.total_written(), 6);
        let event = events.try_pop().unwrap();
        assert_eq!(event.status, StreamStatus::OVERFLOW);
        assert_eq!(event.position, 4);
        assert_eq!(event.missed, 0);
    }

    #[test]
    fn test_full_queue_counts_missed_records() {
        let (writer, buffer) = RingBuffer::with_capacity(64);
        let (mut handler, mut events) = FrameHandler::new(writer, 1);

        handler.on_frames(&[0.0], StreamStatus::OVERFLOW);
        handler.on_frames(&[0.0], StreamStatus::UNDERFLOW);
        handler.on_frames(&[0.0], StreamStatus::UNDERFLOW);
        assert_eq!(buffer.total_written(), 3);

        assert_eq!(events.try_pop().unwrap().missed, 0);
        handler.on_frames(&[0.0], StreamStatus::OVERFLOW);
        let event = events.try_pop().unwrap();
        assert_eq!(event.missed, 2);
        assert_eq!(event.position, 3);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StreamStatus::default().to_string(), "ok");
        assert_eq!(StreamStatus::OVERFLOW.to_string(), "input overflow");
        assert_eq!(StreamStatus::UNDERFLOW.to_string(), "input underflow");
    }
}
