//! Serial event context
//!
//! A single named thread draining the event queue into an [`EventSink`].

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace};

use crate::error::{GattError, Result};

use super::{EventSink, HardwareEvent};

enum Message {
    Event(HardwareEvent),
    Shutdown,
}

/// Cloneable handle for pushing events onto the queue
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Message>,
}

impl EventSender {
    /// Queue an event. Never blocks.
    pub fn send(&self, event: HardwareEvent) -> Result<()> {
        self.tx
            .send(Message::Event(event))
            .map_err(|_| GattError::EventLoop("event loop stopped".to_string()))
    }
}

/// Receiving side, consumed by [`EventLoop::spawn`]
pub struct EventQueue {
    rx: Receiver<Message>,
    tx: Sender<Message>,
}

/// Create the queue before the driver and the sink exist, so the driver can
/// be handed its sender up front.
pub fn event_queue() -> (EventSender, EventQueue) {
    let (tx, rx) = unbounded();
    let sender = EventSender { tx: tx.clone() };
    (sender, EventQueue { rx, tx })
}

/// The running event context
pub struct EventLoop {
    /// Used only to ask the thread to stop
    control: Sender<Message>,

    handle: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Start delivering queued events to `sink` on a thread called `name`
    pub fn spawn<S>(name: &str, queue: EventQueue, sink: Arc<S>) -> Result<Self>
    where
        S: EventSink + 'static,
    {
        let EventQueue { rx, tx } = queue;

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Event loop started");
                let mut delivered: u64 = 0;

                for message in rx.iter() {
                    match message {
                        Message::Event(event) => {
                            trace!(?event, "Delivering event");
                            sink.deliver(event);
                            delivered += 1;
                        }
                        Message::Shutdown => break,
                    }
                }

                debug!(delivered, "Event loop stopped");
            })?;

        info!(thread = name, "Event loop running");

        Ok(Self {
            control: tx,
            handle: Some(handle),
        })
    }

    /// Stop after the events already queued and wait for the thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        // Fails only if the thread already exited
        let _ = self.control.send(Message::Shutdown);

        handle
            .join()
            .map_err(|_| GattError::EventLoop("event thread panicked".to_string()))
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Event loop shutdown failed: {}", e);
        }
    }
}
