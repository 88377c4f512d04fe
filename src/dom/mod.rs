//! # Document Tree
//!
//! A small arena-backed element tree that stands in for the host document
//! inside a Document View. It supports exactly what field binding, merging and
//! snapshotting need: attributes, classes, inline style, text content and
//! inner markup.
//!
//! ```
//! use bindery::dom::Document;
//!
//! let mut doc = Document::parse(r#"<h1 data-field="title">Hello</h1>"#).unwrap();
//! let h1 = doc.elements_with_attr("data-field")[0];
//! doc.set_text_content(h1, "World");
//! assert_eq!(doc.inner_html(doc.root()), r#"<h1 data-field="title">World</h1>"#);
//! ```
//!
//! Nodes are never freed: detaching a node removes it from its parent's
//! child list and the node id stays valid (but unreachable from the root).

mod parse;
mod serialize;
pub mod style;

pub use style::InlineStyle;

use std::fmt;

use crate::error::BinderyError;

/// Tag name of the synthetic fragment root.
pub const ROOT_TAG: &str = "#fragment";

/// Handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable element tree rooted at a synthetic fragment element.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (just the fragment root).
    pub fn new() -> Self {
        let root = Node {
            data: NodeData::Element {
                tag: ROOT_TAG.to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Parse an HTML fragment into a new document.
    pub fn parse(markup: &str) -> Result<Self, BinderyError> {
        let mut doc = Self::new();
        let root = doc.root;
        parse::parse_into(&mut doc, root, markup)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    // ========================================================================
    // CONSTRUCTION & STRUCTURE
    // ========================================================================

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// True when `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == self.root {
                return true;
            }
            cur = self.node(n).parent;
        }
        false
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Insert `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(0, child);
    }

    /// Insert `new` immediately after `reference` in its parent.
    ///
    /// Does nothing if `reference` is detached.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        self.insert_relative(reference, new, 1);
    }

    /// Insert `new` immediately before `reference` in its parent.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        self.insert_relative(reference, new, 0);
    }

    fn insert_relative(&mut self, reference: NodeId, new: NodeId, offset: usize) {
        if reference == new {
            return;
        }
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.detach(new);
        let Some(pos) = self.position_in_parent(reference) else {
            return;
        };
        self.node_mut(new).parent = Some(parent);
        self.node_mut(parent).children.insert(pos + offset, new);
    }

    fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.node(id).parent?;
        self.node(parent).children.iter().position(|c| *c == id)
    }

    /// Remove `id` from its parent. The subtree stays intact but unreachable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|c| *c != id);
            self.node_mut(id).parent = None;
        }
    }

    /// The next sibling of `id`, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let pos = self.position_in_parent(id)?;
        self.node(parent).children.get(pos + 1).copied()
    }

    /// Deep-copy `id` and its subtree. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.node(id).data.clone();
        let copy = self.push_node(data);
        let children = self.node(id).children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.node_mut(child_copy).parent = Some(copy);
            self.node_mut(copy).children.push(child_copy);
        }
        copy
    }

    /// Preorder list of every node below `id` (excluding `id` itself).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.node(n).children.iter().rev().copied());
        }
        out
    }

    /// Attached elements carrying attribute `name`, in document order.
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.has_attr(*n, name))
            .collect()
    }

    // ========================================================================
    // NODE DATA
    // ========================================================================

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    /// Lowercase tag name, or `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Raw text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(t) => Some(t),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            let value = value.into();
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value,
                None => attrs.push((name.to_string(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.retain(|(n, _)| n != name);
        }
    }

    pub(crate) fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs,
            NodeData::Text(_) => &[],
        }
    }

    // ========================================================================
    // CLASSES
    // ========================================================================

    pub fn class_name(&self, id: NodeId) -> &str {
        self.attr(id, "class").unwrap_or("")
    }

    /// Replace the whole class attribute; an empty value removes it.
    pub fn set_class_name(&mut self, id: NodeId, class: &str) {
        let class = class.split_whitespace().collect::<Vec<_>>().join(" ");
        if class.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", class);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.class_name(id).split_whitespace().any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            let joined = format!("{} {}", self.class_name(id), class);
            self.set_class_name(id, &joined);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            let kept: Vec<&str> = self
                .class_name(id)
                .split_whitespace()
                .filter(|c| *c != class)
                .collect();
            let kept = kept.join(" ");
            self.set_class_name(id, &kept);
        }
    }

    // ========================================================================
    // INLINE STYLE
    // ========================================================================

    pub fn style(&self, id: NodeId) -> InlineStyle {
        InlineStyle::parse(self.attr(id, "style").unwrap_or(""))
    }

    /// Write back a style; an empty style removes the attribute.
    pub fn set_style(&mut self, id: NodeId, style: &InlineStyle) {
        if style.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", style.to_string());
        }
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        self.style(id).get(name).map(str::to_string)
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) {
        let mut style = self.style(id);
        style.set(name, value);
        self.set_style(id, &style);
    }

    pub fn remove_style_property(&mut self, id: NodeId, name: &str) {
        let mut style = self.style(id);
        if style.remove(name) {
            self.set_style(id, &style);
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.style(id).get("display") == Some("none")
    }

    /// Hide with `display: none`, or drop that declaration to show again.
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if hidden {
            self.set_style_property(id, "display", "none");
        } else if self.is_hidden(id) {
            self.remove_style_property(id, "display");
        }
    }

    // ========================================================================
    // CONTENT
    // ========================================================================

    /// Concatenated text of `id` and its subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let NodeData::Text(t) = &mut self.node_mut(id).data {
            *t = text.to_string();
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
    }

    /// Serialized markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            serialize::write_node(self, *child, &mut out);
        }
        out
    }

    /// Serialized markup of `id` itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, id, &mut out);
        out
    }

    /// Replace the children of `id` with parsed `markup`.
    ///
    /// Malformed markup is recovered by the parser; on an error the element
    /// is left unchanged.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> Result<(), BinderyError> {
        let holder = self.create_element("div");
        parse::parse_into(self, holder, markup)?;
        self.clear_children(id);
        let parsed = self.children(holder).to_vec();
        for child in parsed {
            self.append_child(id, child);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::parse(
            r#"<div class="card"><p data-field="title">Hi <b>there</b></p><img data-field="pic" src="a.png"></div>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_text_content_concatenates() {
        let doc = sample();
        let p = doc.elements_with_attr("data-field")[0];
        assert_eq!(doc.text_content(p), "Hi there");
    }

    #[test]
    fn test_set_text_content_replaces_children() {
        let mut doc = sample();
        let p = doc.elements_with_attr("data-field")[0];
        doc.set_text_content(p, "Bye");
        assert_eq!(doc.inner_html(p), "Bye");
    }

    #[test]
    fn test_clone_and_insert_after() {
        let mut doc = sample();
        let img = doc.elements_with_attr("data-field")[1];
        let copy = doc.clone_subtree(img);
        assert!(!doc.is_attached(copy));
        doc.insert_after(img, copy);
        assert!(doc.is_attached(copy));
        assert_eq!(doc.next_sibling(img), Some(copy));
        assert_eq!(doc.attr(copy, "src"), Some("a.png"));
    }

    #[test]
    fn test_detach_keeps_id_valid() {
        let mut doc = sample();
        let img = doc.elements_with_attr("data-field")[1];
        doc.detach(img);
        assert!(!doc.is_attached(img));
        assert_eq!(doc.tag(img), Some("img"));
        assert_eq!(doc.elements_with_attr("data-field").len(), 1);
    }

    #[test]
    fn test_class_helpers() {
        let mut doc = sample();
        let div = doc.children(doc.root())[0];
        doc.add_class(div, "active");
        assert!(doc.has_class(div, "active"));
        doc.add_class(div, "active");
        assert_eq!(doc.class_name(div), "card active");
        doc.remove_class(div, "card");
        assert_eq!(doc.class_name(div), "active");
        doc.remove_class(div, "active");
        assert_eq!(doc.attr(div, "class"), None);
    }

    #[test]
    fn test_hidden_toggle() {
        let mut doc = sample();
        let img = doc.elements_with_attr("data-field")[1];
        doc.set_hidden(img, true);
        assert!(doc.is_hidden(img));
        doc.set_hidden(img, false);
        assert!(!doc.is_hidden(img));
        assert_eq!(doc.attr(img, "style"), None);
    }

    #[test]
    fn test_set_inner_html_roundtrip() {
        let mut doc = sample();
        let p = doc.elements_with_attr("data-field")[0];
        doc.set_inner_html(p, "A &amp; <i>B</i>").unwrap();
        assert_eq!(doc.text_content(p), "A & B");
        assert_eq!(doc.inner_html(p), "A &amp; <i>B</i>");
    }

    #[test]
    fn test_set_inner_html_recovers_truncated_markup() {
        let mut doc = sample();
        let p = doc.elements_with_attr("data-field")[0];
        doc.set_inner_html(p, "Sale <b class=\"x").unwrap();
        assert_eq!(doc.inner_html(p), "Sale ");
        assert!(doc.is_attached(p));
    }
}
