//! Paginating text layout.
//!
//! A [`TextDocument`] starts in the [`LayoutPending`] state while a converter fills it
//! with blocks. Only after [`TextDocument::force_layout`] has produced a
//! [`LayoutComplete`] document can positions be turned into viewports; the pending
//! state simply has no such method.

use std::ops::{Add, Range};

use serde::{Deserialize, Serialize};

use crate::model::NormalizedRect;
use crate::viewport::{SubPosition, Viewport};

/// Character offset into the whole document text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPosition(pub usize);

impl Add<usize> for TextPosition {
    type Output = TextPosition;

    fn add(self, rhs: usize) -> Self::Output {
        TextPosition(self.0 + rhs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading with a 0-based level
    Heading(usize),
    Preformatted,
    PageBreak,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub start: TextPosition,
}

impl Block {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    /// Text columns per line
    pub columns: usize,
    pub lines_per_page: usize,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            columns: 72,
            lines_per_page: 48,
        }
    }
}

impl PageSetup {
    fn sanitized(self) -> Self {
        Self {
            columns: self.columns.max(1),
            lines_per_page: self.lines_per_page.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("position {position} is outside the document (length {len})")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("document has no laid out lines")]
    NoLines,
}

/// Marker for a document whose geometry is not known yet
#[derive(Debug, Default)]
pub struct LayoutPending;

/// Geometry produced by the forced layout pass
#[derive(Debug)]
pub struct LayoutComplete {
    setup: PageSetup,
    lines: Vec<LaidOutLine>,
    page_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaidOutLine {
    pub page: usize,
    pub line_in_page: usize,
    pub start: TextPosition,
    pub text: String,
    pub kind: BlockKind,
}

impl LaidOutLine {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug)]
pub struct TextDocument<S> {
    blocks: Vec<Block>,
    len: usize,
    state: S,
}

impl Default for TextDocument<LayoutPending> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TextDocument<S> {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Total length in characters, block separators included
    pub fn char_len(&self) -> usize {
        self.len
    }

    /// True when no block carries any text
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.text.trim().is_empty())
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(self.len);
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match block.kind {
                BlockKind::PageBreak => out.push('\u{c}'),
                _ => out.push_str(&block.text),
            }
        }
        out
    }
}

impl TextDocument<LayoutPending> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
            state: LayoutPending,
        }
    }

    /// Append a block and return the position of its first character
    pub fn push_block(&mut self, kind: BlockKind, text: impl Into<String>) -> TextPosition {
        let start = TextPosition(self.len);
        let block = Block {
            kind,
            text: text.into(),
            start,
        };
        // every block is followed by one separator character
        self.len += block.char_len() + 1;
        self.blocks.push(block);
        start
    }

    pub fn push_paragraph(&mut self, text: impl Into<String>) -> TextPosition {
        self.push_block(BlockKind::Paragraph, text)
    }

    pub fn push_heading(&mut self, level: usize, text: impl Into<String>) -> TextPosition {
        self.push_block(BlockKind::Heading(level), text)
    }

    pub fn push_page_break(&mut self) -> TextPosition {
        self.push_block(BlockKind::PageBreak, String::new())
    }

    /// Run the full layout pass, making page geometry available
    pub fn force_layout(self, setup: &PageSetup) -> TextDocument<LayoutComplete> {
        let setup = setup.sanitized();
        let mut lines = Vec::new();
        let mut page = 0;
        let mut line_in_page = 0;
        let mut break_pending = false;

        for block in &self.blocks {
            if block.kind == BlockKind::PageBreak {
                if line_in_page > 0 {
                    break_pending = true;
                }
                continue;
            }

            if break_pending {
                page += 1;
                line_in_page = 0;
                break_pending = false;
            } else if line_in_page > 0 {
                // blank spacing line between blocks
                line_in_page += 1;
            }

            for (offset, text) in wrap_block(block, setup.columns) {
                if line_in_page >= setup.lines_per_page {
                    page += 1;
                    line_in_page = 0;
                }
                lines.push(LaidOutLine {
                    page,
                    line_in_page,
                    start: block.start + offset,
                    text,
                    kind: block.kind,
                });
                line_in_page += 1;
            }
        }

        log::debug!(
            "Laid out {} blocks into {} lines on {} pages",
            self.blocks.len(),
            lines.len(),
            page + 1
        );

        TextDocument {
            blocks: self.blocks,
            len: self.len,
            state: LayoutComplete {
                setup,
                lines,
                page_count: page + 1,
            },
        }
    }
}

/// Split a block into display lines, returning each line with its char offset
fn wrap_block(block: &Block, columns: usize) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut base = 0;

    for source_line in block.text.split('\n') {
        if block.kind == BlockKind::Preformatted {
            let chars: Vec<char> = source_line.chars().collect();
            if chars.is_empty() {
                out.push((base, String::new()));
            }
            for (i, chunk) in chars.chunks(columns).enumerate() {
                out.push((base + i * columns, chunk.iter().collect()));
            }
        } else {
            let mut cursor = 0;
            for segment in textwrap::wrap(source_line, columns) {
                let segment = segment.as_ref();
                let byte_pos = source_line[cursor..]
                    .find(segment)
                    .map_or(cursor, |found| cursor + found);
                let char_offset = source_line[..byte_pos].chars().count();
                out.push((base + char_offset, segment.to_string()));
                cursor = (byte_pos + segment.len()).min(source_line.len());
            }
        }
        base += source_line.chars().count() + 1;
    }

    if out.is_empty() {
        out.push((0, String::new()));
    }
    out
}

impl TextDocument<LayoutComplete> {
    pub fn page_setup(&self) -> PageSetup {
        self.state.setup
    }

    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    pub fn lines(&self) -> &[LaidOutLine] {
        &self.state.lines
    }

    pub fn page_lines(&self, page: usize) -> &[LaidOutLine] {
        let lines = &self.state.lines;
        let start = lines.partition_point(|l| l.page < page);
        let end = lines.partition_point(|l| l.page <= page);
        &lines[start..end]
    }

    fn locate(&self, position: TextPosition) -> Result<usize, LayoutError> {
        if position.0 >= self.len {
            return Err(LayoutError::PositionOutOfRange {
                position: position.0,
                len: self.len,
            });
        }
        let lines = &self.state.lines;
        if lines.is_empty() {
            return Err(LayoutError::NoLines);
        }
        Ok(lines.partition_point(|l| l.start <= position).saturating_sub(1))
    }

    fn column_of(line: &LaidOutLine, position: TextPosition) -> usize {
        position.0.saturating_sub(line.start.0).min(line.char_len())
    }

    /// Resolve a text position to the page and top-left offset it was laid out at
    pub fn calculate_viewport(&self, position: TextPosition) -> Result<Viewport, LayoutError> {
        let line = &self.state.lines[self.locate(position)?];
        let setup = self.state.setup;
        let column = Self::column_of(line, position);

        let page = i32::try_from(line.page).unwrap_or(i32::MAX);
        Ok(Viewport::page(page).with_sub_position(SubPosition::top_left(
            column as f64 / setup.columns as f64,
            line.line_in_page as f64 / setup.lines_per_page as f64,
        )))
    }

    /// One normalized rectangle per laid out line touched by `range`
    pub fn line_rects(
        &self,
        range: Range<TextPosition>,
    ) -> Result<Vec<(usize, NormalizedRect)>, LayoutError> {
        let first = self.locate(range.start)?;
        let last_pos = TextPosition(range.end.0.saturating_sub(1).max(range.start.0));
        let last = self.locate(last_pos)?;
        let setup = self.state.setup;
        let columns = setup.columns as f64;
        let rows = setup.lines_per_page as f64;

        let rects = self.state.lines[first..=last]
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let begin_col = if i == 0 {
                    Self::column_of(line, range.start)
                } else {
                    0
                };
                let end_col = if first + i == last {
                    Self::column_of(line, last_pos) + 1
                } else {
                    line.char_len()
                };
                let end_col = end_col.min(setup.columns).max(begin_col);
                let top = line.line_in_page as f64 / rows;
                (
                    line.page,
                    NormalizedRect::new(
                        begin_col as f64 / columns,
                        top,
                        end_col as f64 / columns,
                        top + 1.0 / rows,
                    ),
                )
            })
            .collect();
        Ok(rects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(columns: usize, lines_per_page: usize) -> PageSetup {
        PageSetup {
            columns,
            lines_per_page,
        }
    }

    #[test]
    fn positions_account_for_block_separators() {
        let mut doc = TextDocument::new();
        assert_eq!(doc.push_paragraph("abc"), TextPosition(0));
        assert_eq!(doc.push_heading(0, "Title"), TextPosition(4));
        assert_eq!(doc.push_page_break(), TextPosition(10));
        assert_eq!(doc.char_len(), 11);
        assert_eq!(doc.plain_text(), "abc\nTitle\n\u{c}");
    }

    #[test]
    fn wrapping_keeps_char_offsets() {
        let mut doc = TextDocument::new();
        doc.push_paragraph("alpha beta gamma delta");
        let laid_out = doc.force_layout(&setup(11, 10));
        let lines = laid_out.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "alpha beta");
        assert_eq!(lines[1].text, "gamma delta");
        assert_eq!(lines[1].start, TextPosition(11));
    }

    #[test]
    fn paginates_with_spacing_and_breaks() {
        let mut doc = TextDocument::new();
        doc.push_paragraph("one");
        doc.push_paragraph("two");
        doc.push_page_break();
        let third = doc.push_paragraph("three");
        let laid_out = doc.force_layout(&setup(20, 3));

        // "one" at line 0, spacing at 1, "two" at 2, break, "three" on page 1
        assert_eq!(laid_out.page_count(), 2);
        assert_eq!(laid_out.page_lines(0).len(), 2);
        assert_eq!(laid_out.page_lines(0)[1].line_in_page, 2);
        let viewport = laid_out.calculate_viewport(third).unwrap();
        assert_eq!(viewport.page_number, 1);
        assert_eq!(viewport.re_pos.unwrap().normalized_y, 0.0);
    }

    #[test]
    fn overflowing_block_flows_onto_next_page() {
        let mut doc = TextDocument::new();
        let start = doc.push_block(BlockKind::Preformatted, "l1\nl2\nl3\nl4\nl5");
        let laid_out = doc.force_layout(&setup(10, 2));
        assert_eq!(laid_out.page_count(), 3);
        let last = laid_out.calculate_viewport(start + 12).unwrap();
        assert_eq!(last.page_number, 2);
    }

    #[test]
    fn viewport_sub_position_is_normalized() {
        let mut doc = TextDocument::new();
        let p = doc.push_paragraph("abcdefghij");
        let laid_out = doc.force_layout(&setup(20, 4));
        let v = laid_out.calculate_viewport(p + 5).unwrap();
        let pos = v.re_pos.unwrap();
        assert_eq!(pos.normalized_x, 0.25);
        assert_eq!(pos.normalized_y, 0.0);
    }

    #[test]
    fn out_of_range_position_is_an_error() {
        let mut doc = TextDocument::new();
        doc.push_paragraph("abc");
        let laid_out = doc.force_layout(&PageSetup::default());
        assert_eq!(
            laid_out.calculate_viewport(TextPosition(99)),
            Err(LayoutError::PositionOutOfRange {
                position: 99,
                len: 4
            })
        );
    }

    #[test]
    fn empty_document_still_has_one_page() {
        let doc = TextDocument::new();
        assert!(doc.is_empty());
        let laid_out = doc.force_layout(&PageSetup::default());
        assert_eq!(laid_out.page_count(), 1);
        assert!(laid_out.page_lines(0).is_empty());
    }

    #[test]
    fn line_rects_cover_each_touched_line() {
        let mut doc = TextDocument::new();
        let p = doc.push_paragraph("alpha beta gamma delta");
        let laid_out = doc.force_layout(&setup(11, 10));
        let rects = laid_out.line_rects(p + 6..p + 16).unwrap();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].0, 0);
        assert_eq!(rects[0].1.left, 6.0 / 11.0);
        assert_eq!(rects[1].1.left, 0.0);
        assert_eq!(rects[1].1.top, 0.1);
    }
}
