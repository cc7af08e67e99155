//! Publish/subscribe registry for document notifications.
//!
//! Every observer gets its own unbounded channel. The bus never assumes a particular
//! observer is present; receivers that have been dropped are pruned on the next publish.

use flume::{Receiver, Sender};
use log::{debug, trace};

use crate::viewport::Viewport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// The document was replaced (`document_changed`) or only its setup was reloaded
    SetupChanged { document_changed: bool },
    ViewportChanged { viewport: Viewport, smooth_move: bool },
}

#[derive(Debug, Default)]
pub struct ObserverBus {
    subscribers: Vec<(ObserverId, Sender<DocumentEvent>)>,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; re-subscribing an id replaces its previous channel
    pub fn subscribe(&mut self, id: ObserverId) -> Receiver<DocumentEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.push((id, tx));
        debug!("Observer {id:?} subscribed");
        rx
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    pub fn publish(&mut self, event: DocumentEvent) {
        trace!("Publishing {event:?} to {} observers", self.subscribers.len());
        self.subscribers.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!("Observer {id:?} disconnected, dropping it");
            }
            alive
        });
    }

    pub fn observer_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events() {
        let mut bus = ObserverBus::new();
        let a = bus.subscribe(ObserverId(1));
        let b = bus.subscribe(ObserverId(2));

        bus.publish(DocumentEvent::SetupChanged {
            document_changed: true,
        });

        for rx in [&a, &b] {
            assert_eq!(
                rx.try_recv().unwrap(),
                DocumentEvent::SetupChanged {
                    document_changed: true
                }
            );
        }
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = ObserverBus::new();
        let kept = bus.subscribe(ObserverId(1));
        drop(bus.subscribe(ObserverId(2)));

        bus.publish(DocumentEvent::ViewportChanged {
            viewport: Viewport::page(3),
            smooth_move: false,
        });
        assert_eq!(bus.observer_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = ObserverBus::new();
        let rx = bus.subscribe(ObserverId(7));
        assert!(bus.unsubscribe(ObserverId(7)));
        assert!(!bus.unsubscribe(ObserverId(7)));
        bus.publish(DocumentEvent::SetupChanged {
            document_changed: false,
        });
        assert!(rx.try_recv().is_err());
    }
}
