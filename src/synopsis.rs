//! Hierarchical outline description handed from a generator to the outline tree.
//!
//! Each element carries a display name and string attributes. The attributes read
//! downstream are [`ATTR_VIEWPORT`], [`ATTR_VIEWPORT_NAME`] and
//! [`ATTR_EXTERNAL_FILE_NAME`].

use log::debug;

pub const ATTR_VIEWPORT: &str = "Viewport";
pub const ATTR_VIEWPORT_NAME: &str = "ViewportName";
pub const ATTR_EXTERNAL_FILE_NAME: &str = "ExternalFileName";

/// Handle to an element inside a [`DocumentSynopsis`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynopsisElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    children: Vec<ElementId>,
}

impl SynopsisElement {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynopsisError {
    #[error("invalid synopsis XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentSynopsis {
    elements: Vec<SynopsisElement>,
    roots: Vec<ElementId>,
}

impl DocumentSynopsis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of elements at all depths
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn element(&self, id: ElementId) -> Option<&SynopsisElement> {
        self.elements.get(id.0)
    }

    pub fn push_root(&mut self, name: impl Into<String>) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(SynopsisElement::new(name));
        self.roots.push(id);
        id
    }

    /// Append a child, or a root when `parent` is unknown
    pub fn push_child(&mut self, parent: ElementId, name: impl Into<String>) -> ElementId {
        if parent.0 >= self.elements.len() {
            return self.push_root(name);
        }
        let id = ElementId(self.elements.len());
        self.elements.push(SynopsisElement::new(name));
        self.elements[parent.0].children.push(id);
        id
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: impl Into<String>) {
        let Some(element) = self.elements.get_mut(id.0) else {
            return;
        };
        let value = value.into();
        match element.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => element.attributes.push((name.to_string(), value)),
        }
    }

    /// Parse an XML outline; children of the document element become top-level entries
    pub fn from_xml(content: &str) -> Result<Self, SynopsisError> {
        let doc = roxmltree::Document::parse(content)?;
        let mut synopsis = Self::new();
        for node in doc.root_element().children().filter(|n| n.is_element()) {
            synopsis.append_xml_node(node, None);
        }
        debug!("Parsed synopsis with {} elements", synopsis.len());
        Ok(synopsis)
    }

    fn append_xml_node(&mut self, node: roxmltree::Node, parent: Option<ElementId>) {
        let name = node.tag_name().name();
        let id = match parent {
            Some(parent) => self.push_child(parent, name),
            None => self.push_root(name),
        };
        for attr in node.attributes() {
            self.set_attribute(id, attr.name(), attr.value());
        }
        for child in node.children().filter(|n| n.is_element()) {
            self.append_xml_node(child, Some(id));
        }
    }

    /// Depth-first pre-order walk yielding `(depth, id)`
    pub fn walk(&self) -> Vec<(usize, ElementId)> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut stack: Vec<(usize, ElementId)> =
            self.roots.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            if let Some(element) = self.element(id) {
                stack.extend(element.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_structure() {
        let mut syn = DocumentSynopsis::new();
        let a = syn.push_root("A");
        let a1 = syn.push_child(a, "A.1");
        syn.set_attribute(a1, ATTR_VIEWPORT, "2");
        syn.set_attribute(a1, ATTR_VIEWPORT, "3");
        let b = syn.push_root("B");

        assert_eq!(syn.roots(), &[a, b]);
        assert_eq!(syn.element(a).unwrap().children(), &[a1]);
        assert_eq!(syn.element(a1).unwrap().attribute(ATTR_VIEWPORT), Some("3"));
        assert_eq!(syn.walk(), vec![(0, a), (1, a1), (0, b)]);
    }

    #[test]
    fn parses_xml_outline() {
        let xml = r#"<synopsis>
            <Chapter1 Viewport="0">
                <Section1.1 Viewport="2"/>
            </Chapter1>
            <Appendix ViewportName="appendix" ExternalFileName="other.doc"/>
        </synopsis>"#;
        let syn = DocumentSynopsis::from_xml(xml).unwrap();
        assert_eq!(syn.roots().len(), 2);
        let chapter = syn.element(syn.roots()[0]).unwrap();
        assert_eq!(chapter.name, "Chapter1");
        assert_eq!(chapter.children().len(), 1);
        let appendix = syn.element(syn.roots()[1]).unwrap();
        assert_eq!(appendix.attribute(ATTR_VIEWPORT_NAME), Some("appendix"));
        assert_eq!(
            appendix.attribute(ATTR_EXTERNAL_FILE_NAME),
            Some("other.doc")
        );
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(DocumentSynopsis::from_xml("<a><b></a>").is_err());
    }
}
