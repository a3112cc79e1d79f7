// Copyright (c) 2024 Mike Tsao

//! Traits shared by the channel-based services.

use crossbeam_channel::{Receiver, Sender};
use log::warn;

/// Service methods.
///
/// A service runs in its own thread as a daemon and communicates with clients
/// by crossbeam channels. It accepts Inputs and produces Events.
pub trait ProvidesService<I: core::fmt::Debug, E: core::fmt::Debug> {
    /// The sender side of the Input channel. Use this to send commands to the
    /// service.
    fn sender(&self) -> &Sender<I>;

    /// Sends an Input to the service without blocking. Returns false if the
    /// service is no longer listening.
    fn send_input(&self, input: I) -> bool {
        if let Err(e) = self.sender().try_send(input) {
            warn!("While sending: {e:?}");
            false
        } else {
            true
        }
    }

    /// The receiver side of the Event channel. Integrate this into a listener
    /// loop to respond to events.
    fn receiver(&self) -> &Receiver<E>;
}
