//! Text rendering of outline rows

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{NodeId, OutlineNode, OutlineTree, TOC_SEPARATOR};

/// A row of the flattened, filtered outline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutlineRow {
    pub depth: usize,
    pub id: NodeId,
    pub highlighted: bool,
}

/// Split a node label into its page column and title
pub fn split_label(label: &str) -> (Option<&str>, &str) {
    match label.split_once(TOC_SEPARATOR) {
        Some((page, title)) => (Some(page), title),
        None => (None, label),
    }
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        // leave room for the ellipsis
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    if width > 0 {
        out.push('…');
    }
    out
}

impl OutlineNode {
    /// Title padded so the page number ends exactly at `width` columns
    pub fn render_row(&self, width: usize, page_column: bool) -> String {
        let (page, title) = split_label(&self.label);
        let page = page.filter(|_| page_column);
        let Some(page) = page else {
            return truncate_to_width(title, width);
        };

        let page_width = page.width();
        if page_width + 1 >= width {
            return truncate_to_width(title, width);
        }
        let title = truncate_to_width(title, width - page_width - 1);
        let padding = width - page_width - title.width();
        format!("{title}{}{page}", " ".repeat(padding))
    }
}

impl OutlineTree {
    /// Rows a tree view would show, honoring expansion and the filter
    pub fn visible_rows(&self) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        let filtering = !self.filter.is_empty();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !self.is_visible(id) {
                continue;
            }
            let Some(node) = self.node(id) else {
                continue;
            };
            rows.push(OutlineRow {
                depth: node.depth,
                id,
                highlighted: self.highlighted == Some(id),
            });
            // a filter shows matches even inside folded entries
            if node.expanded || filtering {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        rows
    }

    /// Plain text lines for the visible rows, each exactly `width` columns or less
    pub fn render_lines(&self, width: usize, page_column: bool) -> Vec<String> {
        self.visible_rows()
            .into_iter()
            .filter_map(|row| {
                let node = self.node(row.id)?;
                let marker = if row.highlighted { ">" } else { " " };
                let icon = match (node.has_children(), node.expanded) {
                    (false, _) => " ",
                    (true, true) => "▼",
                    (true, false) => "▶",
                };
                let prefix = format!("{marker}{}{icon} ", "  ".repeat(row.depth));
                let remaining = width.saturating_sub(prefix.width());
                Some(format!("{prefix}{}", node.render_row(remaining, page_column)))
            })
            .collect()
    }
}
