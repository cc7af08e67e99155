//! The loaded document as seen by observers.
//!
//! `Document` owns the generator and the current viewport, publishes changes on the
//! [`ObserverBus`] and collects requests that must leave the document (opening another
//! file, browsing a URL) for the embedding application to act on.

use std::path::Path;

use log::{debug, info, warn};

use crate::bus::{DocumentEvent, ObserverBus, ObserverId};
use crate::converter::ConversionError;
use crate::generator::TextDocumentGenerator;
use crate::model::{Action, DocumentInfo, Page};
use crate::synopsis::DocumentSynopsis;
use crate::viewport::Viewport;

/// Read access the outline needs from whatever owns the document
pub trait DocumentSource {
    fn synopsis(&self) -> Option<&DocumentSynopsis>;
    fn meta_data(&self, key: &str, option: &str) -> Option<String>;
    fn viewport(&self) -> &Viewport;
}

/// Something the document cannot satisfy by itself
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentRequest {
    OpenExternal { file: String, viewport: Viewport },
    OpenUrl(String),
}

pub struct Document {
    generator: TextDocumentGenerator,
    pages: Vec<Page>,
    /// Overrides the generator's synopsis when set
    synopsis: Option<DocumentSynopsis>,
    viewport: Viewport,
    bus: ObserverBus,
    requests: Vec<DocumentRequest>,
}

impl Document {
    pub fn new(generator: TextDocumentGenerator) -> Self {
        Self {
            generator,
            pages: Vec::new(),
            synopsis: None,
            viewport: Viewport::unset(),
            bus: ObserverBus::new(),
            requests: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, id: ObserverId) -> flume::Receiver<DocumentEvent> {
        self.bus.subscribe(id)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn open(&mut self, path: &Path) -> Result<(), ConversionError> {
        self.open_inner(path, None)
    }

    /// Open `path` but present `synopsis` as its outline instead of the generated one
    pub fn open_with_synopsis(
        &mut self,
        path: &Path,
        synopsis: DocumentSynopsis,
    ) -> Result<(), ConversionError> {
        self.open_inner(path, Some(synopsis))
    }

    fn open_inner(
        &mut self,
        path: &Path,
        synopsis: Option<DocumentSynopsis>,
    ) -> Result<(), ConversionError> {
        let pages = match self.generator.load_document(path) {
            Ok(pages) => pages,
            Err(e) => {
                // a failed load leaves nothing behind
                self.close();
                return Err(e);
            }
        };
        info!("Opened {path:?} with {} pages", pages.len());
        self.pages = pages;
        self.synopsis = synopsis;
        self.viewport = Viewport::unset();
        self.bus.publish(DocumentEvent::SetupChanged {
            document_changed: true,
        });
        self.set_viewport(Viewport::page(0), false);
        Ok(())
    }

    pub fn close(&mut self) {
        debug!("Closing document");
        self.generator.close_document();
        self.pages.clear();
        self.synopsis = None;
        self.viewport = Viewport::unset();
        self.bus.publish(DocumentEvent::SetupChanged {
            document_changed: true,
        });
    }

    /// Announce a setup change that kept the same document
    pub fn reload_setup(&mut self) {
        self.bus.publish(DocumentEvent::SetupChanged {
            document_changed: false,
        });
    }

    pub fn is_opened(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn generator(&self) -> &TextDocumentGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut TextDocumentGenerator {
        &mut self.generator
    }

    pub fn document_info(&self) -> &DocumentInfo {
        self.generator.document_info()
    }

    /// Move to `viewport`; invalid or out-of-range pages are ignored
    pub fn set_viewport(&mut self, viewport: Viewport, smooth_move: bool) -> bool {
        let in_range = viewport
            .page_index()
            .is_some_and(|page| page < self.pages.len());
        if !in_range {
            warn!(
                "Ignoring viewport {viewport} outside {} pages",
                self.pages.len()
            );
            return false;
        }
        self.viewport = viewport;
        self.bus.publish(DocumentEvent::ViewportChanged {
            viewport,
            smooth_move,
        });
        true
    }

    pub fn process_link(&mut self, action: &Action) {
        match action {
            Action::Goto {
                external_file: None,
                viewport,
            } => {
                self.set_viewport(*viewport, true);
            }
            Action::Goto {
                external_file: Some(file),
                viewport,
            } => self.requests.push(DocumentRequest::OpenExternal {
                file: file.clone(),
                viewport: *viewport,
            }),
            Action::Browse { url } => self.requests.push(DocumentRequest::OpenUrl(url.clone())),
        }
    }

    pub fn request_external(&mut self, file: impl Into<String>, viewport: Viewport) {
        self.requests.push(DocumentRequest::OpenExternal {
            file: file.into(),
            viewport,
        });
    }

    pub fn pending_requests(&self) -> &[DocumentRequest] {
        &self.requests
    }

    pub fn drain_requests(&mut self) -> Vec<DocumentRequest> {
        std::mem::take(&mut self.requests)
    }
}

impl DocumentSource for Document {
    fn synopsis(&self) -> Option<&DocumentSynopsis> {
        self.synopsis
            .as_ref()
            .or_else(|| self.generator.document_synopsis())
    }

    fn meta_data(&self, key: &str, option: &str) -> Option<String> {
        self.generator.meta_data(key, option)
    }

    fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::converter::PlainTextConverter;
    use crate::generator::GeneratorSettings;

    fn open_text(text: &str) -> (Document, tempfile::NamedTempFile) {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let generator = TextDocumentGenerator::new(
            Box::new(PlainTextConverter::new()),
            GeneratorSettings::default(),
        );
        let mut document = Document::new(generator);
        document.open(file.path()).unwrap();
        (document, file)
    }

    #[test]
    fn open_publishes_setup_then_first_page() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"one\n\x0c\ntwo\n").unwrap();
        let generator = TextDocumentGenerator::new(
            Box::new(PlainTextConverter::new()),
            GeneratorSettings::default(),
        );
        let mut document = Document::new(generator);
        let rx = document.subscribe(ObserverId(1));
        document.open(file.path()).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            DocumentEvent::SetupChanged {
                document_changed: true
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            DocumentEvent::ViewportChanged { viewport, .. } if viewport.page_number == 0
        ));
        assert_eq!(document.page_count(), 2);
    }

    #[test]
    fn out_of_range_viewports_are_ignored() {
        let (mut document, _file) = open_text("single page\n");
        assert!(!document.set_viewport(Viewport::page(4), false));
        assert!(!document.set_viewport(Viewport::unset(), false));
        assert_eq!(document.viewport().page_number, 0);
    }

    #[test]
    fn links_turn_into_requests_or_moves() {
        let (mut document, _file) = open_text("a\n\x0c\nb\n");
        document.process_link(&Action::goto(Viewport::page(1)));
        assert_eq!(document.viewport().page_number, 1);

        document.process_link(&Action::goto_external("other.md", Viewport::page(2)));
        document.process_link(&Action::Browse {
            url: "https://example.org".to_string(),
        });
        assert_eq!(document.viewport().page_number, 1);
        assert_eq!(
            document.drain_requests(),
            vec![
                DocumentRequest::OpenExternal {
                    file: "other.md".to_string(),
                    viewport: Viewport::page(2)
                },
                DocumentRequest::OpenUrl("https://example.org".to_string()),
            ]
        );
        assert!(document.pending_requests().is_empty());
    }

    #[test]
    fn failed_open_leaves_document_closed() {
        let generator = TextDocumentGenerator::new(
            Box::new(PlainTextConverter::new()),
            GeneratorSettings::default(),
        );
        let mut document = Document::new(generator);
        assert!(document.open(Path::new("/definitely/not/here.txt")).is_err());
        assert!(!document.is_opened());
        assert!(!document.viewport().is_valid());
    }

    #[test]
    fn explicit_synopsis_overrides_generated_one() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"text\n").unwrap();
        let generator = TextDocumentGenerator::new(
            Box::new(PlainTextConverter::new()),
            GeneratorSettings::default(),
        );
        let mut document = Document::new(generator);
        let mut synopsis = DocumentSynopsis::new();
        synopsis.push_root("Custom");
        document.open_with_synopsis(file.path(), synopsis).unwrap();
        assert_eq!(document.synopsis().map(DocumentSynopsis::len), Some(1));
    }
}
