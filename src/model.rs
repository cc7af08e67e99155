//! Document model produced by the generator

use serde::{Deserialize, Serialize};

use crate::viewport::Viewport;

/// Rectangle in page-relative coordinates (0.0..=1.0)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl NormalizedRect {
    #[must_use]
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Smallest rectangle covering both
    #[must_use]
    pub fn united(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// What happens when a link is followed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Jump to a viewport, possibly inside another document
    Goto {
        external_file: Option<String>,
        viewport: Viewport,
    },
    Browse {
        url: String,
    },
}

impl Action {
    pub fn goto(viewport: Viewport) -> Self {
        Self::Goto {
            external_file: None,
            viewport,
        }
    }

    pub fn goto_external(file: impl Into<String>, viewport: Viewport) -> Self {
        Self::Goto {
            external_file: Some(file.into()),
            viewport,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Text,
    Highlight,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub author: Option<String>,
    pub contents: String,
    /// Filled in by the generator once the annotated range is laid out
    pub boundary: NormalizedRect,
}

impl Annotation {
    pub fn text(contents: impl Into<String>) -> Self {
        Self {
            kind: AnnotationKind::Text,
            author: None,
            contents: contents.into(),
            boundary: NormalizedRect::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    pub fn highlight(contents: impl Into<String>) -> Self {
        Self {
            kind: AnnotationKind::Highlight,
            ..Self::text(contents)
        }
    }
}

/// A clickable area on a page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRect {
    pub rect: NormalizedRect,
    pub action: Action,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 0-based page index
    pub number: usize,
    /// Size in pixels at 100% zoom
    pub width: u32,
    pub height: u32,
    pub object_rects: Vec<ObjectRect>,
    pub annotations: Vec<Annotation>,
}

impl Page {
    pub fn new(number: usize, width: u32, height: u32) -> Self {
        Self {
            number,
            width,
            height,
            object_rects: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// First link whose area contains the normalized point
    pub fn action_at(&self, x: f64, y: f64) -> Option<&Action> {
        self.object_rects
            .iter()
            .find(|r| r.rect.contains(x, y))
            .map(|r| &r.action)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
    /// Human readable category/title of the entry
    pub title: String,
}

/// Ordered metadata store.
///
/// Re-setting a key keeps its original position and overwrites value and title.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    entries: Vec<MetaEntry>,
}

impl DocumentInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, title: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let title = title.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.value = value;
                entry.title = title;
            }
            None => self.entries.push(MetaEntry { key, value, title }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn entries(&self) -> &[MetaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    PlainText,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "text/plain",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "Plain Text",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::PlainText => "txt",
        }
    }
}

/// A word and where it sits on the page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextEntity {
    pub text: String,
    pub area: NormalizedRect,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPage {
    pub entities: Vec<TextEntity>,
}

impl TextPage {
    pub fn text(&self) -> String {
        self.entities
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
