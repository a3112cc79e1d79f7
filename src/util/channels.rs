// Copyright (c) 2024 Mike Tsao

use crossbeam_channel::{Receiver, Sender};

/// A convenience struct to bundle both halves of a [crossbeam_channel]
/// together.
#[derive(Debug)]
pub struct CrossbeamChannel<T> {
    #[allow(missing_docs)]
    pub sender: Sender<T>,
    #[allow(missing_docs)]
    pub receiver: Receiver<T>,
}
impl<T> Default for CrossbeamChannel<T> {
    fn default() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }
}
impl<T> CrossbeamChannel<T> {
    /// A channel that holds at most `capacity` undelivered messages.
    pub fn new_bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self { sender, receiver }
    }
}
impl<T> Clone for CrossbeamChannel<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_channel_refuses_when_full() {
        let channel = CrossbeamChannel::new_bounded(2);
        assert!(channel.sender.try_send(1).is_ok());
        assert!(channel.sender.try_send(2).is_ok());
        assert!(channel.sender.try_send(3).is_err());
        assert_eq!(channel.receiver.recv().unwrap(), 1);
        assert!(channel.sender.try_send(3).is_ok());
    }
}
