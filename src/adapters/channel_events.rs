//! Event sink that forwards engine events over an `mpsc` channel.
//!
//! Sending never blocks. Events published after the receiver is dropped are
//! discarded.

use std::sync::mpsc::{channel, Receiver, Sender};

use crate::domain::event::EngineEvent;
use crate::ports::event_port::EventPort;

#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: Sender<EngineEvent>,
}

impl ChannelEvents {
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        ChannelEvents { tx }
    }

    /// A sink plus the receiving end for a consumer thread.
    pub fn pair() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = channel();
        (ChannelEvents { tx }, rx)
    }
}

impl EventPort for ChannelEvents {
    fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Forwards every event to each inner sink in order.
pub struct FanoutEvents<'a> {
    sinks: Vec<&'a dyn EventPort>,
}

impl<'a> FanoutEvents<'a> {
    pub fn new(sinks: Vec<&'a dyn EventPort>) -> Self {
        FanoutEvents { sinks }
    }
}

impl EventPort for FanoutEvents<'_> {
    fn publish(&self, event: EngineEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(event.clone());
            }
            last.publish(event);
        }
    }
}
