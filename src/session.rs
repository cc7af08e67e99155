//! Wires a [`Document`] and an [`OutlineTree`] together over the observer bus.

use flume::Receiver;
use log::{debug, trace};

use crate::bus::{DocumentEvent, ObserverId};
use crate::document::{Document, DocumentSource};
use crate::outline::{NodeId, OutlineEffect, OutlineTree, RowHit};

pub const OUTLINE_OBSERVER: ObserverId = ObserverId(1);

pub struct Session {
    document: Document,
    outline: OutlineTree,
    events: Receiver<DocumentEvent>,
    has_outline: bool,
}

impl Session {
    pub fn new(mut document: Document, outline: OutlineTree) -> Self {
        let events = document.subscribe(OUTLINE_OBSERVER);
        Self {
            document,
            outline,
            events,
            has_outline: false,
        }
    }

    /// Deliver queued notifications to the outline and apply what it asks for,
    /// until no new notifications are produced. Returns the number handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            trace!("Outline received {event:?}");
            let effects = self.outline.handle(&event, &self.document);
            self.apply(effects);
            handled += 1;
        }
        handled
    }

    fn apply(&mut self, effects: Vec<OutlineEffect>) {
        for effect in effects {
            match effect {
                OutlineEffect::HasOutline(available) => {
                    debug!("Outline available: {available}");
                    self.has_outline = available;
                }
                OutlineEffect::SetViewport(viewport) => {
                    self.document.set_viewport(viewport, true);
                }
                OutlineEffect::OpenExternal { file, viewport } => {
                    self.document.request_external(file, viewport);
                }
                OutlineEffect::HighlightChanged(id) => {
                    trace!("Outline highlight moved to {id:?}");
                }
            }
        }
    }

    /// Activate an outline entry as if it had been clicked
    pub fn activate(&mut self, id: NodeId) {
        let effects = self.outline.on_node_activated(id);
        self.apply(effects);
        self.pump();
    }

    pub fn click(&mut self, hit: RowHit) {
        let effects = self.outline.on_row_activated(hit);
        self.apply(effects);
        self.pump();
    }

    pub fn has_outline(&self) -> bool {
        self.has_outline
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn outline(&self) -> &OutlineTree {
        &self.outline
    }

    pub fn outline_mut(&mut self) -> &mut OutlineTree {
        &mut self.outline
    }

    pub fn page_number(&self) -> i32 {
        self.document.viewport().page_number
    }
}
