//! Converter plugins and the structural event queue they fill.
//!
//! A converter parses a source into a [`TextDocument`] that has not been laid out yet,
//! and records links, annotations, titles and metadata against layout-native
//! [`TextPosition`]s. The generator drains the queue once the layout pass is done.

mod markdown;
mod plain;

pub use markdown::MarkdownConverter;
pub use plain::PlainTextConverter;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::{LayoutPending, TextDocument, TextPosition};
use crate::model::{Action, Annotation};
use crate::notification::Notification;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} contains no content")]
    Empty(PathBuf),

    #[error("cannot parse source: {0}")]
    Parse(String),
}

/// Where a link points before layout is known
#[derive(Clone, Debug, PartialEq)]
pub enum LinkTarget {
    Action(Action),
    /// Named destination inside the same document
    Anchor(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum StructuralEvent {
    Link {
        target: LinkTarget,
        begin: TextPosition,
        end: TextPosition,
    },
    Annotation {
        annotation: Annotation,
        begin: TextPosition,
        end: TextPosition,
    },
    Title {
        level: usize,
        text: String,
        position: TextPosition,
    },
    MetaData {
        key: String,
        value: String,
        title: String,
    },
    Anchor {
        name: String,
        position: TextPosition,
    },
}

#[derive(Clone, Debug)]
pub enum ConverterEvent {
    Structural(StructuralEvent),
    Diagnostic(Notification),
}

/// Ordered queue of everything a converter reports during conversion
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<ConverterEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: StructuralEvent) {
        self.events.push_back(ConverterEvent::Structural(event));
    }

    pub fn add_action(&mut self, action: Action, begin: TextPosition, end: TextPosition) {
        self.push(StructuralEvent::Link {
            target: LinkTarget::Action(action),
            begin,
            end,
        });
    }

    pub fn add_anchor_link(
        &mut self,
        anchor: impl Into<String>,
        begin: TextPosition,
        end: TextPosition,
    ) {
        self.push(StructuralEvent::Link {
            target: LinkTarget::Anchor(anchor.into()),
            begin,
            end,
        });
    }

    pub fn add_annotation(
        &mut self,
        annotation: Annotation,
        begin: TextPosition,
        end: TextPosition,
    ) {
        self.push(StructuralEvent::Annotation {
            annotation,
            begin,
            end,
        });
    }

    pub fn add_title(&mut self, level: usize, text: impl Into<String>, position: TextPosition) {
        self.push(StructuralEvent::Title {
            level,
            text: text.into(),
            position,
        });
    }

    pub fn add_meta_data(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        title: impl Into<String>,
    ) {
        self.push(StructuralEvent::MetaData {
            key: key.into(),
            value: value.into(),
            title: title.into(),
        });
    }

    pub fn add_anchor(&mut self, name: impl Into<String>, position: TextPosition) {
        self.push(StructuralEvent::Anchor {
            name: name.into(),
            position,
        });
    }

    pub fn error(&mut self, message: impl Into<String>, duration: Duration) {
        self.events
            .push_back(ConverterEvent::Diagnostic(Notification::error(message, duration)));
    }

    pub fn warning(&mut self, message: impl Into<String>, duration: Duration) {
        self.events
            .push_back(ConverterEvent::Diagnostic(Notification::warning(message, duration)));
    }

    pub fn notice(&mut self, message: impl Into<String>, duration: Duration) {
        self.events
            .push_back(ConverterEvent::Diagnostic(Notification::notice(message, duration)));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and yield every queued event in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = ConverterEvent> + '_ {
        self.events.drain(..)
    }
}

/// A source format plugin
pub trait Converter {
    fn name(&self) -> &str;

    /// Parse `source`, reporting structural data through `events`
    fn convert(
        &mut self,
        source: &Path,
        events: &mut EventQueue,
    ) -> Result<TextDocument<LayoutPending>, ConversionError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    #[default]
    Auto,
    Text,
    Markdown,
}

impl SourceFormat {
    /// Pick a format from the file extension
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" | "mdown" => SourceFormat::Markdown,
            _ => SourceFormat::Text,
        }
    }
}

/// Build the converter that handles `path` in the requested format
pub fn converter_for(path: &Path, format: SourceFormat) -> Box<dyn Converter> {
    let format = match format {
        SourceFormat::Auto => SourceFormat::detect(path),
        other => other,
    };
    match format {
        SourceFormat::Markdown => Box::new(MarkdownConverter::new()),
        _ => Box::new(PlainTextConverter::new()),
    }
}

pub(crate) fn read_source(path: &Path, events: &mut EventQueue) -> Result<String, ConversionError> {
    let bytes = std::fs::read(path).map_err(|source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            events.warning(
                "File is not valid UTF-8, some characters were replaced",
                Duration::from_secs(4),
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_preserves_arrival_order() {
        let mut queue = EventQueue::new();
        queue.add_title(0, "Intro", TextPosition(0));
        queue.notice("converted", Duration::from_secs(1));
        queue.add_meta_data("author", "Ann", "Author");

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(matches!(
            &drained[0],
            ConverterEvent::Structural(StructuralEvent::Title { text, .. }) if text == "Intro"
        ));
        assert!(matches!(&drained[1], ConverterEvent::Diagnostic(n) if n.message == "converted"));
        assert!(queue.is_empty());
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(
            SourceFormat::detect(Path::new("notes.MD")),
            SourceFormat::Markdown
        );
        assert_eq!(SourceFormat::detect(Path::new("notes.txt")), SourceFormat::Text);
        assert_eq!(SourceFormat::detect(Path::new("README")), SourceFormat::Text);
        assert_eq!(
            converter_for(Path::new("a.markdown"), SourceFormat::Auto).name(),
            "markdown"
        );
        assert_eq!(
            converter_for(Path::new("a.markdown"), SourceFormat::Text).name(),
            "text"
        );
    }
}
