//! Navigable outline built from a [`DocumentSynopsis`] and kept in sync with the viewport.
//!
//! Nodes live in an arena in depth-first pre-order, so iterating the arena is the same as
//! walking the tree in display order. The tree never talks to the document directly:
//! every entry point returns [`OutlineEffect`]s that the owner applies.

mod render;

pub use render::{OutlineRow, split_label};

use log::{debug, trace};

use crate::bus::DocumentEvent;
use crate::document::DocumentSource;
use crate::generator::META_NAMED_VIEWPORT;
use crate::settings;
use crate::synopsis::{
    ATTR_EXTERNAL_FILE_NAME, ATTR_VIEWPORT, ATTR_VIEWPORT_NAME, DocumentSynopsis, ElementId,
    SynopsisElement,
};
use crate::viewport::Viewport;

/// Sits between the 1-based page number and the title in a node label
pub const TOC_SEPARATOR: &str = "@@@@@@@@@@";

/// Synopsis attribute that controls the initial expansion of an entry
pub const ATTR_OPEN: &str = "Open";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub struct OutlineNode {
    /// `"<page+1>@@@@@@@@@@<title>"` when resolved, the bare title otherwise
    pub label: String,
    pub title: String,
    pub viewport: Viewport,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub source_element: ElementId,
    pub external_file: Option<String>,
    pub expanded: bool,
}

impl OutlineNode {
    pub fn is_resolved(&self) -> bool {
        self.viewport.is_valid()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutlineEffect {
    /// Emitted once per rebuild
    HasOutline(bool),
    SetViewport(Viewport),
    OpenExternal { file: String, viewport: Viewport },
    HighlightChanged(Option<NodeId>),
}

/// Where a click on a rendered row landed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowHit {
    Entry(NodeId),
    /// The fold marker; toggles expansion only
    Expander(NodeId),
}

#[derive(Debug)]
pub struct OutlineTree {
    nodes: Vec<OutlineNode>,
    roots: Vec<NodeId>,
    highlighted: Option<NodeId>,
    current_page: i32,
    filter: String,
    case_sensitive: bool,
}

impl Default for OutlineTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineTree {
    /// Empty tree using the configured filter case sensitivity
    pub fn new() -> Self {
        Self::with_case_sensitivity(settings::get_settings().filter_case_sensitive)
    }

    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            highlighted: None,
            current_page: Viewport::UNSET_PAGE,
            filter: String::new(),
            case_sensitive,
        }
    }

    pub fn handle(
        &mut self,
        event: &DocumentEvent,
        source: &dyn DocumentSource,
    ) -> Vec<OutlineEffect> {
        match event {
            DocumentEvent::SetupChanged {
                document_changed: false,
            } => Vec::new(),
            DocumentEvent::SetupChanged {
                document_changed: true,
            } => self.rebuild(source.synopsis(), source),
            DocumentEvent::ViewportChanged { viewport, .. } => {
                self.on_viewport_changed(viewport.page_number)
            }
        }
    }

    /// Throw away every node and project `synopsis` again. An empty synopsis counts as none.
    pub fn rebuild(
        &mut self,
        synopsis: Option<&DocumentSynopsis>,
        source: &dyn DocumentSource,
    ) -> Vec<OutlineEffect> {
        self.nodes.clear();
        self.roots.clear();
        self.highlighted = None;
        self.current_page = Viewport::UNSET_PAGE;
        self.filter.clear();

        let Some(synopsis) = synopsis.filter(|s| !s.is_empty()) else {
            debug!("No outline available");
            return vec![OutlineEffect::HasOutline(false)];
        };

        for &root in synopsis.roots() {
            self.add_element(synopsis, root, None, 0, source);
        }
        debug!("Built outline with {} entries", self.nodes.len());
        vec![OutlineEffect::HasOutline(true)]
    }

    fn add_element(
        &mut self,
        synopsis: &DocumentSynopsis,
        element_id: ElementId,
        parent: Option<NodeId>,
        depth: usize,
        source: &dyn DocumentSource,
    ) {
        let Some(element) = synopsis.element(element_id) else {
            return;
        };
        let viewport = resolve_viewport(element, source);
        let label = if let Some(page) = viewport.page_index() {
            format!("{}{TOC_SEPARATOR}{}", page + 1, element.name)
        } else {
            element.name.clone()
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(OutlineNode {
            label,
            title: element.name.clone(),
            viewport,
            children: Vec::new(),
            parent,
            depth,
            source_element: element_id,
            external_file: element
                .attribute(ATTR_EXTERNAL_FILE_NAME)
                .filter(|file| !file.is_empty())
                .map(str::to_string),
            expanded: element.attribute(ATTR_OPEN) != Some("false"),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }

        for &child in element.children() {
            self.add_element(synopsis, child, Some(id), depth + 1, source);
        }
    }

    /// Highlight the first entry, in display order, that points at `page`
    pub fn on_viewport_changed(&mut self, page: i32) -> Vec<OutlineEffect> {
        if page == self.current_page {
            return Vec::new();
        }
        self.current_page = page;

        let previous = self.highlighted.take();
        let found = if page < 0 {
            None
        } else {
            self.nodes
                .iter()
                .position(|node| node.viewport.page_number == page)
                .map(NodeId)
        };
        self.highlighted = found;
        if let Some(id) = found {
            self.expand_ancestors(id);
        }
        trace!("Viewport page {page} highlights {found:?}");

        if previous == found {
            Vec::new()
        } else {
            vec![OutlineEffect::HighlightChanged(found)]
        }
    }

    pub fn on_node_activated(&self, id: NodeId) -> Vec<OutlineEffect> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        if let Some(file) = &node.external_file {
            return vec![OutlineEffect::OpenExternal {
                file: file.clone(),
                viewport: node.viewport,
            }];
        }
        if node.is_resolved() {
            vec![OutlineEffect::SetViewport(node.viewport)]
        } else {
            debug!("Entry {:?} has no target", node.title);
            Vec::new()
        }
    }

    pub fn on_row_activated(&mut self, hit: RowHit) -> Vec<OutlineEffect> {
        match hit {
            RowHit::Entry(id) => self.on_node_activated(id),
            RowHit::Expander(id) => {
                self.toggle_expanded(id);
                Vec::new()
            }
        }
    }

    pub fn toggle_expanded(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if node.has_children() {
                node.expanded = !node.expanded;
            }
        }
    }

    fn expand_ancestors(&mut self, id: NodeId) {
        let mut parent = self.nodes.get(id.0).and_then(|n| n.parent);
        while let Some(p) = parent {
            let node = &mut self.nodes[p.0];
            node.expanded = true;
            parent = node.parent;
        }
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_string();
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    fn matches(&self, node: &OutlineNode) -> bool {
        if self.case_sensitive {
            node.title.contains(&self.filter)
        } else {
            node.title
                .to_lowercase()
                .contains(&self.filter.to_lowercase())
        }
    }

    /// Visible under the current filter: the entry or one of its descendants matches
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if self.filter.is_empty() || self.matches(node) {
            return true;
        }
        node.children.iter().any(|child| self.is_visible(*child))
    }

    pub fn node(&self, id: NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[OutlineNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }

    pub fn current_page(&self) -> i32 {
        self.current_page
    }
}

fn resolve_viewport(element: &SynopsisElement, source: &dyn DocumentSource) -> Viewport {
    if let Some(raw) = element.attribute(ATTR_VIEWPORT) {
        return Viewport::parse_lossy(raw);
    }
    if let Some(name) = element.attribute(ATTR_VIEWPORT_NAME) {
        return match source.meta_data(META_NAMED_VIEWPORT, name) {
            Some(raw) => Viewport::parse_lossy(&raw),
            None => {
                debug!("Named viewport {name:?} not found");
                Viewport::unset()
            }
        };
    }
    Viewport::unset()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        synopsis: Option<DocumentSynopsis>,
        named: HashMap<String, String>,
        viewport: Viewport,
    }

    impl DocumentSource for FakeSource {
        fn synopsis(&self) -> Option<&DocumentSynopsis> {
            self.synopsis.as_ref()
        }

        fn meta_data(&self, key: &str, option: &str) -> Option<String> {
            (key == META_NAMED_VIEWPORT)
                .then(|| self.named.get(option).cloned())
                .flatten()
        }

        fn viewport(&self) -> &Viewport {
            &self.viewport
        }
    }

    fn chapters() -> DocumentSynopsis {
        let mut syn = DocumentSynopsis::new();
        let c1 = syn.push_root("Chapter1");
        syn.set_attribute(c1, ATTR_VIEWPORT, "0");
        let s11 = syn.push_child(c1, "Section1.1");
        syn.set_attribute(s11, ATTR_VIEWPORT, "2");
        let c2 = syn.push_root("Chapter2");
        syn.set_attribute(c2, ATTR_VIEWPORT, "5");
        syn
    }

    fn built(syn: &DocumentSynopsis) -> OutlineTree {
        let mut tree = OutlineTree::with_case_sensitivity(false);
        tree.rebuild(Some(syn), &FakeSource::default());
        tree
    }

    #[test]
    fn labels_carry_one_based_page_prefix() {
        let tree = built(&chapters());
        let labels: Vec<_> = tree.nodes().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "1@@@@@@@@@@Chapter1",
                "3@@@@@@@@@@Section1.1",
                "6@@@@@@@@@@Chapter2"
            ]
        );
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.node(tree.roots()[0]).unwrap().children.len(), 1);
    }

    #[test]
    fn named_viewports_resolve_through_metadata() {
        let mut syn = DocumentSynopsis::new();
        let known = syn.push_root("Known");
        syn.set_attribute(known, ATTR_VIEWPORT_NAME, "intro");
        let lost = syn.push_root("Lost");
        syn.set_attribute(lost, ATTR_VIEWPORT_NAME, "missing");
        let bare = syn.push_root("Bare");

        let mut source = FakeSource::default();
        source.named.insert("intro".to_string(), "4".to_string());
        let mut tree = OutlineTree::with_case_sensitivity(false);
        tree.rebuild(Some(&syn), &source);

        assert_eq!(tree.nodes()[0].viewport.page_number, 4);
        assert_eq!(tree.nodes()[0].label, "5@@@@@@@@@@Known");
        assert_eq!(tree.nodes()[1].viewport.page_number, -1);
        assert_eq!(tree.nodes()[1].label, "Lost");
        assert_eq!(tree.nodes()[2].source_element, bare);
    }

    #[test]
    fn explicit_viewport_wins_over_name() {
        let mut syn = DocumentSynopsis::new();
        let both = syn.push_root("Both");
        syn.set_attribute(both, ATTR_VIEWPORT, "1");
        syn.set_attribute(both, ATTR_VIEWPORT_NAME, "intro");
        let mut source = FakeSource::default();
        source.named.insert("intro".to_string(), "4".to_string());

        let mut tree = OutlineTree::with_case_sensitivity(false);
        tree.rebuild(Some(&syn), &source);
        assert_eq!(tree.nodes()[0].viewport.page_number, 1);
    }

    #[test]
    fn viewport_change_highlights_first_match_only() {
        let mut syn = chapters();
        let dup = syn.push_root("Also page 2");
        syn.set_attribute(dup, ATTR_VIEWPORT, "2");
        let mut tree = built(&syn);

        let effects = tree.on_viewport_changed(2);
        assert_eq!(effects, vec![OutlineEffect::HighlightChanged(Some(NodeId(1)))]);
        assert_eq!(tree.node(NodeId(1)).unwrap().title, "Section1.1");

        assert!(tree.on_viewport_changed(2).is_empty());
        assert_eq!(tree.highlighted(), Some(NodeId(1)));

        let effects = tree.on_viewport_changed(3);
        assert_eq!(effects, vec![OutlineEffect::HighlightChanged(None)]);
        assert_eq!(tree.highlighted(), None);
    }

    #[test]
    fn highlight_reveals_collapsed_parents() {
        let mut syn = chapters();
        syn.set_attribute(ElementId(0), ATTR_OPEN, "false");
        let mut tree = built(&syn);
        assert!(!tree.node(NodeId(0)).unwrap().expanded);

        tree.on_viewport_changed(2);
        assert!(tree.node(NodeId(0)).unwrap().expanded);
    }

    #[test]
    fn activation_routes_by_target() {
        let mut syn = chapters();
        let ext = syn.push_root("Elsewhere");
        syn.set_attribute(ext, ATTR_EXTERNAL_FILE_NAME, "other.doc");
        syn.set_attribute(ext, ATTR_VIEWPORT, "0");
        syn.push_root("Nowhere");
        let tree = built(&syn);

        assert_eq!(
            tree.on_node_activated(NodeId(2)),
            vec![OutlineEffect::SetViewport(Viewport::page(5))]
        );
        assert_eq!(
            tree.on_node_activated(NodeId(3)),
            vec![OutlineEffect::OpenExternal {
                file: "other.doc".to_string(),
                viewport: Viewport::page(0)
            }]
        );
        assert!(tree.on_node_activated(NodeId(4)).is_empty());
        assert!(tree.on_node_activated(NodeId(99)).is_empty());
    }

    #[test]
    fn empty_external_file_name_jumps_inside_the_document() {
        let mut syn = DocumentSynopsis::new();
        let local = syn.push_root("Local");
        syn.set_attribute(local, ATTR_VIEWPORT, "2");
        syn.set_attribute(local, ATTR_EXTERNAL_FILE_NAME, "");
        let tree = built(&syn);

        assert_eq!(tree.nodes()[0].external_file, None);
        assert_eq!(
            tree.on_node_activated(NodeId(0)),
            vec![OutlineEffect::SetViewport(Viewport::page(2))]
        );
    }

    #[test]
    fn expander_hits_only_toggle() {
        let mut tree = built(&chapters());
        assert!(tree.on_row_activated(RowHit::Expander(NodeId(0))).is_empty());
        assert!(!tree.node(NodeId(0)).unwrap().expanded);
        // leaves have nothing to fold
        tree.on_row_activated(RowHit::Expander(NodeId(1)));
        assert!(tree.node(NodeId(1)).unwrap().expanded);
    }

    #[test]
    fn filter_keeps_ancestors_of_matches() {
        let mut tree = built(&chapters());
        tree.set_filter("section");
        assert!(tree.is_visible(NodeId(0)));
        assert!(tree.is_visible(NodeId(1)));
        assert!(!tree.is_visible(NodeId(2)));
        assert_eq!(tree.len(), 3);

        let mut strict = OutlineTree::with_case_sensitivity(true);
        strict.rebuild(Some(&chapters()), &FakeSource::default());
        strict.set_filter("section");
        assert!(!strict.is_visible(NodeId(1)));
    }

    #[test]
    fn rebuild_resets_state() {
        let mut tree = built(&chapters());
        tree.set_filter("chapter");
        tree.on_viewport_changed(0);

        let effects = tree.rebuild(Some(&chapters()), &FakeSource::default());
        assert_eq!(effects, vec![OutlineEffect::HasOutline(true)]);
        assert_eq!(tree.highlighted(), None);
        assert_eq!(tree.current_page(), Viewport::UNSET_PAGE);
        assert!(tree.filter().is_empty());

        let effects = tree.rebuild(None, &FakeSource::default());
        assert_eq!(effects, vec![OutlineEffect::HasOutline(false)]);
        assert!(tree.is_empty());

        let effects = tree.rebuild(Some(&DocumentSynopsis::new()), &FakeSource::default());
        assert_eq!(effects, vec![OutlineEffect::HasOutline(false)]);
    }

    #[test]
    fn setup_change_without_new_document_is_ignored() {
        let source = FakeSource {
            synopsis: Some(chapters()),
            ..FakeSource::default()
        };
        let mut tree = OutlineTree::with_case_sensitivity(false);
        let effects = tree.handle(
            &DocumentEvent::SetupChanged {
                document_changed: true,
            },
            &source,
        );
        assert_eq!(effects, vec![OutlineEffect::HasOutline(true)]);
        tree.on_viewport_changed(5);

        let effects = tree.handle(
            &DocumentEvent::SetupChanged {
                document_changed: false,
            },
            &source,
        );
        assert!(effects.is_empty());
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.highlighted(), Some(NodeId(2)));
    }
}
