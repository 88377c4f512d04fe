//! HTML fragment parsing.
//!
//! `html5ever` runs the HTML5 fragment algorithm (body context) into an
//! `RcDom`; the result is then copied into the [`Document`] arena. Comments,
//! doctypes and processing instructions are dropped. Malformed markup is
//! recovered the way a browser would recover it.

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, QualName, local_name, namespace_url, ns, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{Document, NodeId};
use crate::error::BinderyError;

/// Parse `markup` and append the resulting nodes to `parent`.
///
/// Fails only if the parser output has no fragment root.
pub(super) fn parse_into(doc: &mut Document, parent: NodeId, markup: &str) -> Result<(), BinderyError> {
    let dom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        Vec::new(),
    )
    .one(markup);

    // The fragment's nodes hang off a synthetic <html> element.
    let fragment_root = dom
        .document
        .children
        .borrow()
        .iter()
        .find(|h| matches!(h.data, NodeData::Element { .. }))
        .cloned()
        .ok_or_else(|| BinderyError::Parse("fragment parser produced no root element".into()))?;

    copy_children(doc, parent, &fragment_root);
    Ok(())
}

fn copy_children(doc: &mut Document, parent: NodeId, handle: &Handle) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                let text = contents.borrow();
                if !text.is_empty() {
                    let node = doc.create_text(text.to_string());
                    doc.append_child(parent, node);
                }
            }
            NodeData::Element { name, attrs, .. } => {
                let el = doc.create_element(&name.local);
                for attr in attrs.borrow().iter() {
                    doc.set_attr(el, &attr.name.local, attr.value.to_string());
                }
                doc.append_child(parent, el);
                copy_children(doc, el, child);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements_and_attrs() {
        let doc = Document::parse(
            r#"<div class='a b' data-field=title hidden><span>x</span></div>"#,
        )
        .unwrap();
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.tag(div), Some("div"));
        assert_eq!(doc.attr(div, "class"), Some("a b"));
        assert_eq!(doc.attr(div, "data-field"), Some("title"));
        assert_eq!(doc.attr(div, "hidden"), Some(""));
        assert_eq!(doc.text_content(div), "x");
    }

    #[test]
    fn test_void_and_self_closing() {
        let doc = Document::parse(r#"<p>a<br>b<img src="x.png"/>c</p>"#).unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 5);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn test_comments_dropped_and_strays_ignored() {
        let doc = Document::parse("<!-- note --><p>a</span>b</p>").unwrap();
        assert_eq!(doc.children(doc.root()).len(), 1);
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "ab");
    }

    #[test]
    fn test_unclosed_elements_closed_at_end() {
        let doc = Document::parse("<div><p>open").unwrap();
        assert_eq!(doc.inner_html(doc.root()), "<div><p>open</p></div>");
    }

    #[test]
    fn test_entities_decoded() {
        let doc = Document::parse("<p>a &amp; b &lt;c&gt; &#65;&#x42;</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "a & b <c> AB");
    }

    #[test]
    fn test_lone_less_than_is_text() {
        let doc = Document::parse("<p>1 < 2</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "1 < 2");
    }

    #[test]
    fn test_style_element_raw_text() {
        let doc = Document::parse("<style>.a > b { color: red }</style><p>x</p>").unwrap();
        let style = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(style), ".a > b { color: red }");
        assert_eq!(doc.children(doc.root()).len(), 2);
    }

    #[test]
    fn test_block_inside_paragraph_closes_it() {
        let doc = Document::parse("<p>intro<div>block</div>").unwrap();
        let tags: Vec<_> = doc
            .children(doc.root())
            .iter()
            .filter_map(|n| doc.tag(*n))
            .collect();
        assert_eq!(tags, ["p", "div"]);
    }

    #[test]
    fn test_tag_cut_off_at_end_is_dropped() {
        // The attribute value runs to end of input, so the tag never completes.
        let doc = Document::parse(r#"<p class="x>hi</p><b>ok</b>"#).unwrap();
        assert!(doc.children(doc.root()).is_empty());
    }
}
