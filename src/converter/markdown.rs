//! Lightweight markdown converter.
//!
//! Supports ATX headings with optional `{#id}` anchors, fenced code, paragraphs,
//! list items, `[text](target)` links, a leading `---` front matter block of
//! `key: value` pairs, `<!-- note: ... -->` and `<!-- highlight: ... -->` annotations
//! and `<!-- pagebreak -->`.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use log::debug;
use regex::Regex;

use super::{ConversionError, Converter, EventQueue, read_source};
use crate::layout::{BlockKind, LayoutPending, TextDocument, TextPosition};
use crate::model::{Action, Annotation};
use crate::viewport::Viewport;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+\{#([\w-]+)\})?\s*#*\s*$")
        .expect("Failed to compile heading regex")
});
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("Failed to compile link regex")
});
static NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<!--\s*(note|highlight):\s*(.*?)\s*-->$")
        .expect("Failed to compile note regex")
});
static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("Failed to compile list item regex")
});

const DIAGNOSTIC_DURATION: Duration = Duration::from_secs(4);

/// Github-style heading slug used as an implicit anchor
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    slug
}

/// Strip inline links, returning the display text and `(begin, end, target)` char ranges
fn extract_links(text: &str) -> (String, Vec<(usize, usize, String)>) {
    let mut out = String::with_capacity(text.len());
    let mut links = Vec::new();
    let mut last = 0;
    for caps in LINK_RE.captures_iter(text) {
        let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let begin = out.chars().count();
        out.push_str(label.as_str());
        let end = out.chars().count();
        links.push((begin, end, target.as_str().to_string()));
        last = whole.end();
    }
    out.push_str(&text[last..]);
    (out, links)
}

fn title_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Default)]
pub struct MarkdownConverter {
    /// Range of the most recently emitted block, target for notes
    last_block: Option<(TextPosition, TextPosition)>,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_inline(
        &mut self,
        doc: &mut TextDocument<LayoutPending>,
        events: &mut EventQueue,
        kind: BlockKind,
        raw: &str,
    ) -> TextPosition {
        let (text, links) = extract_links(raw);
        let len = text.chars().count();
        let start = doc.push_block(kind, text);
        for (begin, end, target) in links {
            self.emit_link(events, &target, start + begin, start + end);
        }
        self.last_block = Some((start, start + len.max(1)));
        start
    }

    fn emit_link(
        &self,
        events: &mut EventQueue,
        target: &str,
        begin: TextPosition,
        end: TextPosition,
    ) {
        if let Some(anchor) = target.strip_prefix('#') {
            events.add_anchor_link(anchor, begin, end);
        } else if target.contains("://") || target.starts_with("mailto:") {
            events.add_action(
                Action::Browse {
                    url: target.to_string(),
                },
                begin,
                end,
            );
        } else {
            let (file, fragment) = target.split_once('#').unwrap_or((target, ""));
            let viewport = if fragment.is_empty() {
                Viewport::page(0)
            } else {
                Viewport::parse_lossy(fragment)
            };
            events.add_action(Action::goto_external(file, viewport), begin, end);
        }
    }

    /// Consume a leading front matter block, returning the remaining lines
    fn front_matter<'a>(&self, lines: &'a [&'a str], events: &mut EventQueue) -> &'a [&'a str] {
        if lines.first().map(|l| l.trim()) != Some("---") {
            return lines;
        }
        let Some(close) = lines.iter().skip(1).position(|l| l.trim() == "---") else {
            events.warning("Unterminated front matter ignored", DIAGNOSTIC_DURATION);
            return lines;
        };
        for line in &lines[1..=close] {
            match line.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => {
                    let key = key.trim();
                    events.add_meta_data(key, value.trim(), title_case(key));
                }
                _ if line.trim().is_empty() => {}
                _ => events.warning(
                    format!("Malformed front matter line: {}", line.trim()),
                    DIAGNOSTIC_DURATION,
                ),
            }
        }
        &lines[close + 2..]
    }

    pub fn convert_str(
        &mut self,
        text: &str,
        events: &mut EventQueue,
    ) -> TextDocument<LayoutPending> {
        self.last_block = None;
        let all_lines: Vec<&str> = text.lines().collect();
        let lines = self.front_matter(&all_lines, events);

        let mut doc = TextDocument::new();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut fence: Option<Vec<&str>> = None;

        for &line in lines {
            let trimmed = line.trim();

            if let Some(code) = fence.as_mut() {
                if trimmed.starts_with("```") {
                    let body = code.join("\n");
                    let start = doc.push_block(BlockKind::Preformatted, body.as_str());
                    self.last_block = Some((start, start + body.chars().count().max(1)));
                    fence = None;
                } else {
                    code.push(line);
                }
                continue;
            }

            let is_structural = trimmed.is_empty()
                || trimmed.starts_with("```")
                || trimmed.starts_with('#')
                || trimmed.starts_with("<!--")
                || LIST_ITEM_RE.is_match(trimmed);
            if is_structural && !paragraph.is_empty() {
                let joined = paragraph.join(" ");
                self.push_inline(&mut doc, events, BlockKind::Paragraph, &joined);
                paragraph.clear();
            }

            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with("```") {
                fence = Some(Vec::new());
            } else if let Some(caps) = HEADING_RE.captures(trimmed) {
                let level = caps.get(1).map_or(1, |m| m.as_str().len()) - 1;
                let raw_title = caps.get(2).map_or("", |m| m.as_str());
                let start = self.push_inline(&mut doc, events, BlockKind::Heading(level), raw_title);
                let (title, _) = extract_links(raw_title);
                let anchor = caps
                    .get(3)
                    .map_or_else(|| slugify(&title), |m| m.as_str().to_string());
                if !anchor.is_empty() {
                    events.add_anchor(anchor, start);
                }
                events.add_title(level, title, start);
            } else if trimmed.eq_ignore_ascii_case("<!-- pagebreak -->") {
                doc.push_page_break();
            } else if let Some(caps) = NOTE_RE.captures(trimmed) {
                let note = caps.get(2).map_or("", |m| m.as_str());
                let annotation = match &caps[1] {
                    "highlight" => Annotation::highlight(note),
                    _ => Annotation::text(note),
                };
                match self.last_block {
                    Some((begin, end)) => events.add_annotation(annotation, begin, end),
                    None => events.warning(
                        "Note before any content was ignored",
                        DIAGNOSTIC_DURATION,
                    ),
                }
            } else if trimmed.starts_with("<!--") {
                debug!("Skipping comment line");
            } else if LIST_ITEM_RE.is_match(trimmed) {
                let item = LIST_ITEM_RE.replace(trimmed, "• ");
                self.push_inline(&mut doc, events, BlockKind::Paragraph, &item);
            } else {
                paragraph.push(trimmed);
            }
        }

        if !paragraph.is_empty() {
            let joined = paragraph.join(" ");
            self.push_inline(&mut doc, events, BlockKind::Paragraph, &joined);
        }
        if let Some(code) = fence {
            events.warning("Unterminated code block", DIAGNOSTIC_DURATION);
            doc.push_block(BlockKind::Preformatted, code.join("\n"));
        }
        doc
    }
}

impl Converter for MarkdownConverter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn convert(
        &mut self,
        source: &Path,
        events: &mut EventQueue,
    ) -> Result<TextDocument<LayoutPending>, ConversionError> {
        let text = read_source(source, events)?;
        let doc = self.convert_str(&text, events);
        if doc.is_empty() {
            return Err(ConversionError::Empty(source.to_path_buf()));
        }
        debug!(
            "Converted markdown {:?}: {} blocks, {} queued events",
            source,
            doc.blocks().len(),
            events.len()
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConverterEvent, LinkTarget, StructuralEvent};
    use crate::model::AnnotationKind;
    use crate::notification::NotificationLevel;

    fn convert(text: &str) -> (TextDocument<LayoutPending>, Vec<ConverterEvent>) {
        let mut events = EventQueue::new();
        let doc = MarkdownConverter::new().convert_str(text, &mut events);
        let drained = events.drain().collect();
        (doc, drained)
    }

    fn structural(events: &[ConverterEvent]) -> Vec<&StructuralEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                ConverterEvent::Structural(s) => Some(s),
                ConverterEvent::Diagnostic(_) => None,
            })
            .collect()
    }

    #[test]
    fn slugify_matches_heading_anchor_style() {
        assert_eq!(slugify("Getting Started!"), "getting-started");
        assert_eq!(slugify("  API v2_beta "), "api-v2_beta");
    }

    #[test]
    fn headings_become_titles_with_anchors() {
        let (doc, events) = convert("# Intro\n\ntext\n\n## Usage {#use}\n");
        let events = structural(&events);
        assert_eq!(doc.blocks()[0].kind, BlockKind::Heading(0));
        assert_eq!(doc.blocks()[2].text, "Usage");
        assert!(events.contains(&&StructuralEvent::Title {
            level: 1,
            text: "Usage".to_string(),
            position: doc.blocks()[2].start,
        }));
        assert!(events.contains(&&StructuralEvent::Anchor {
            name: "use".to_string(),
            position: doc.blocks()[2].start,
        }));
        assert!(events.contains(&&StructuralEvent::Anchor {
            name: "intro".to_string(),
            position: TextPosition(0),
        }));
    }

    #[test]
    fn links_are_stripped_and_classified() {
        let (doc, events) = convert(
            "See [docs](https://example.com), [intro](#intro) and [other](other.md#2).",
        );
        assert_eq!(doc.blocks()[0].text, "See docs, intro and other.");
        let links: Vec<_> = structural(&events)
            .into_iter()
            .filter_map(|e| match e {
                StructuralEvent::Link { target, begin, end } => Some((target, *begin, *end)),
                _ => None,
            })
            .collect();
        assert_eq!(links.len(), 3);
        assert!(matches!(links[0].0, LinkTarget::Action(Action::Browse { .. })));
        assert_eq!((links[0].1, links[0].2), (TextPosition(4), TextPosition(8)));
        assert_eq!(links[1].0, &LinkTarget::Anchor("intro".to_string()));
        assert_eq!(
            links[2].0,
            &LinkTarget::Action(Action::goto_external("other.md", Viewport::page(2)))
        );
    }

    #[test]
    fn front_matter_becomes_metadata() {
        let (doc, events) = convert("---\ntitle: Manual\nauthor: Ann\nbogus\n---\nBody\n");
        assert_eq!(doc.blocks().len(), 1);
        let events_s = structural(&events);
        assert_eq!(
            events_s[0],
            &StructuralEvent::MetaData {
                key: "title".to_string(),
                value: "Manual".to_string(),
                title: "Title".to_string(),
            }
        );
        assert!(events.iter().any(|e| matches!(
            e,
            ConverterEvent::Diagnostic(n) if n.level == NotificationLevel::Warning
        )));
    }

    #[test]
    fn notes_attach_to_previous_block() {
        let (doc, events) = convert("Para one\n<!-- note: check this -->\n");
        let annotations: Vec<_> = structural(&events)
            .into_iter()
            .filter(|e| matches!(e, StructuralEvent::Annotation { .. }))
            .collect();
        assert_eq!(annotations.len(), 1);
        if let StructuralEvent::Annotation { annotation, begin, .. } = annotations[0] {
            assert_eq!(annotation.contents, "check this");
            assert_eq!(*begin, doc.blocks()[0].start);
        }

        let (_, events) = convert("<!-- note: orphan -->\nText\n");
        assert!(events.iter().any(|e| matches!(e, ConverterEvent::Diagnostic(_))));
    }

    #[test]
    fn highlight_comments_become_highlight_annotations() {
        let (_, events) = convert("Para one\n<!-- highlight: key idea -->\n");
        let kinds: Vec<_> = structural(&events)
            .into_iter()
            .filter_map(|e| match e {
                StructuralEvent::Annotation { annotation, .. } => {
                    Some((annotation.kind, annotation.contents.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![(AnnotationKind::Highlight, "key idea".to_string())]);
    }

    #[test]
    fn code_fences_and_page_breaks() {
        let (doc, _) = convert("```\nfn main() {}\n  indented\n```\n<!-- pagebreak -->\n- item\n");
        let kinds: Vec<_> = doc.blocks().iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Preformatted,
                BlockKind::PageBreak,
                BlockKind::Paragraph
            ]
        );
        assert_eq!(doc.blocks()[0].text, "fn main() {}\n  indented");
        assert_eq!(doc.blocks()[2].text, "• item");
    }
}
