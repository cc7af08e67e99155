use std::path::Path;

use log::debug;

use super::{ConversionError, Converter, EventQueue, read_source};
use crate::layout::{LayoutPending, TextDocument};

/// Plain text: blank lines separate paragraphs, form feeds separate pages
#[derive(Debug, Default)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn convert_str(&self, text: &str) -> TextDocument<LayoutPending> {
        let mut doc = TextDocument::new();
        for (page_idx, page) in text.split('\u{c}').enumerate() {
            if page_idx > 0 {
                doc.push_page_break();
            }
            let mut paragraph: Vec<&str> = Vec::new();
            for line in page.lines() {
                let line = line.trim();
                if line.is_empty() {
                    if !paragraph.is_empty() {
                        doc.push_paragraph(paragraph.join(" "));
                        paragraph.clear();
                    }
                } else {
                    paragraph.push(line);
                }
            }
            if !paragraph.is_empty() {
                doc.push_paragraph(paragraph.join(" "));
            }
        }
        doc
    }
}

impl Converter for PlainTextConverter {
    fn name(&self) -> &str {
        "text"
    }

    fn convert(
        &mut self,
        source: &Path,
        events: &mut EventQueue,
    ) -> Result<TextDocument<LayoutPending>, ConversionError> {
        let text = read_source(source, events)?;
        let doc = self.convert_str(&text);
        if doc.is_empty() {
            return Err(ConversionError::Empty(source.to_path_buf()));
        }

        if let Some(stem) = source.file_stem() {
            events.add_meta_data("title", stem.to_string_lossy(), "Title");
        }
        debug!(
            "Converted {:?} into {} blocks",
            source,
            doc.blocks().len()
        );
        Ok(doc)
    }
}
