//! Session monitor task - drains producer status records and polls the level.
//!
//! The monitor is the control-side partner of the audio callback:
//! - Status records queued by the [`FrameHandler`](super::FrameHandler) are
//!   logged and forwarded as [`SessionEvent::ProducerStatus`]
//! - The [`LevelMeter`] is polled on a fixed interval and published as
//!   [`SessionEvent::Level`]
//!
//! It runs until its shutdown signal fires or the sending half is dropped,
//! so its lifetime is tied to the stream it watches. It only holds a weak
//! reference to the buffer; the session owns it.

use std::sync::Weak;
use std::time::Duration;

use ringbuf::traits::Consumer;
use tokio::sync::watch;

use crate::event::EventCallback;
use crate::meter::LevelMeter;
use crate::pipeline::{ProducerEvent, RingBuffer};
use crate::SessionEvent;

/// Cancellation handle for a running monitor.
///
/// Dropping it stops the monitor as well.
#[derive(Debug)]
pub(crate) struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    /// Signals the monitor to drain what is left and exit.
    pub fn cancel(self) {
        let _ = self.shutdown.send(true);
        // The task finishes on its own; the handle is detached.
        drop(self.task);
    }
}

pub(crate) struct SessionMonitor {
    device_id: String,
    buffer: Weak<RingBuffer>,
    events: ringbuf::HeapCons<ProducerEvent>,
    meter: LevelMeter,
    interval: Duration,
    event_callback: Option<EventCallback>,
}

impl SessionMonitor {
    pub fn new(
        device_id: impl Into<String>,
        buffer: Weak<RingBuffer>,
        events: ringbuf::HeapCons<ProducerEvent>,
        meter: LevelMeter,
        interval: Duration,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            buffer,
            events,
            meter,
            interval,
            event_callback,
        }
    }

    /// Spawns the monitor on the current Tokio runtime.
    ///
    /// Returns `None` outside a runtime; the stream then runs unmonitored and
    /// status records stay queued until the stream stops.
    pub fn spawn(self) -> Option<MonitorHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                device = %self.device_id,
                "no Tokio runtime; level meter and status logging disabled"
            );
            return None;
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(self.run(shutdown_rx));
        Some(MonitorHandle { shutdown, task })
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        // A zero period would make `interval` panic.
        let period = self.interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.drain_producer_events();
                    self.publish_level();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.drain_producer_events();
        tracing::debug!(device = %self.device_id, "session monitor stopped");
    }

    fn drain_producer_events(&mut self) {
        while let Some(event) = self.events.try_pop() {
            tracing::warn!(
                device = %self.device_id,
                status = %event.status,
                position = event.position,
                missed = event.missed,
                "input stream status: {}",
                event.status
            );
            self.emit(SessionEvent::ProducerStatus {
                device_id: self.device_id.clone(),
                status: event.status,
                position: event.position,
                missed: event.missed,
            });
        }
    }

    fn publish_level(&self) {
        // Gone once the session has released it; nothing left to meter.
        let Some(buffer) = self.buffer.upgrade() else {
            return;
        };
        let reading = self.meter.measure(Some(&buffer));
        self.emit(SessionEvent::Level(reading));
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}
