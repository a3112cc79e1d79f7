// Copyright (c) 2024 Mike Tsao

use super::{MetronomeEvent, MetronomeInput};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::debug;
use synonym::Synonym;

/// Identifies one subscriber to a [MetronomeService](super::MetronomeService).
#[derive(Synonym, Eq, PartialEq)]
#[synonym(skip(PartialEq))]
pub struct ObserverId(pub usize);

/// A live subscription to metronome events. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    receiver: Receiver<MetronomeEvent>,
    service: Sender<MetronomeInput>,
}
impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.service.try_send(MetronomeInput::Unsubscribe(self.id));
    }
}
impl Subscription {
    pub(super) fn new_with(
        id: ObserverId,
        receiver: Receiver<MetronomeEvent>,
        service: Sender<MetronomeInput>,
    ) -> Self {
        Self {
            id,
            receiver,
            service,
        }
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Every event published after the subscription took effect, in order.
    pub fn receiver(&self) -> &Receiver<MetronomeEvent> {
        &self.receiver
    }
}

/// The daemon's list of subscribers. Sending never blocks, and subscribers
/// who have gone away are dropped from the list.
#[derive(Debug, Default)]
pub(super) struct ObserverList {
    observers: Vec<(ObserverId, Sender<MetronomeEvent>)>,
}
impl ObserverList {
    pub(super) fn add(&mut self, id: ObserverId, sender: Sender<MetronomeEvent>) {
        self.remove(id);
        self.observers.push((id, sender));
    }

    pub(super) fn remove(&mut self, id: ObserverId) {
        self.observers.retain(|(observer_id, _)| *observer_id != id);
    }

    pub(super) fn notify(&mut self, event: MetronomeEvent) {
        self.observers.retain(|(id, sender)| match sender.try_send(event.clone()) {
            Ok(_) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => {
                debug!("dropping disconnected observer {id}");
                false
            }
        });
    }

    pub(super) fn len(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifies_and_prunes() {
        let mut observers = ObserverList::default();
        let (first_sender, first) = crossbeam_channel::unbounded();
        let (second_sender, second) = crossbeam_channel::unbounded();
        observers.add(ObserverId(1), first_sender);
        observers.add(ObserverId(2), second_sender);

        observers.notify(MetronomeEvent::PlayStateChanged(true));
        assert_eq!(first.try_recv(), Ok(MetronomeEvent::PlayStateChanged(true)));
        assert_eq!(second.try_recv(), Ok(MetronomeEvent::PlayStateChanged(true)));

        drop(second);
        observers.notify(MetronomeEvent::PlayStateChanged(false));
        assert_eq!(observers.len(), 1);
        assert_eq!(first.try_recv(), Ok(MetronomeEvent::PlayStateChanged(false)));

        observers.remove(ObserverId(1));
        observers.notify(MetronomeEvent::Quit);
        assert!(first.try_recv().is_err());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let (service_sender, service_receiver) = crossbeam_channel::unbounded();
        let (_, events) = crossbeam_channel::unbounded();
        let subscription = Subscription::new_with(ObserverId(7), events, service_sender);
        assert_eq!(subscription.id(), ObserverId(7));
        drop(subscription);
        assert!(matches!(
            service_receiver.try_recv(),
            Ok(MetronomeInput::Unsubscribe(ObserverId(7)))
        ));
    }
}
