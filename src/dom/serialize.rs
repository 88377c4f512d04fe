//! Markup serialization for [`Document`] nodes.

use super::{Document, NodeId, ROOT_TAG};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(super) fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    if let Some(text) = doc.text(id) {
        let raw = doc
            .parent(id)
            .and_then(|p| doc.tag(p))
            .is_some_and(|t| t == "style" || t == "script");
        if raw {
            out.push_str(text);
        } else {
            escape_text(text, out);
        }
        return;
    }

    let tag = doc.tag(id).unwrap_or_default();
    if tag == ROOT_TAG {
        for child in doc.children(id) {
            write_node(doc, *child, out);
        }
        return;
    }

    out.push('<');
    out.push_str(tag);
    for (name, value) in doc.attrs(id) {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&tag) {
        return;
    }
    for child in doc.children(id) {
        write_node(doc, *child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Document;

    #[test]
    fn test_attribute_escaping() {
        let mut doc = Document::new();
        let el = doc.create_element("span");
        doc.set_attr(el, "title", r#"say "hi" & go"#);
        let root = doc.root();
        doc.append_child(root, el);
        assert_eq!(
            doc.inner_html(root),
            r#"<span title="say &quot;hi&quot; &amp; go"></span>"#
        );
    }

    #[test]
    fn test_void_element_has_no_closing_tag() {
        let doc = Document::parse(r#"<img src="a.png"><br>"#).unwrap();
        assert_eq!(doc.inner_html(doc.root()), r#"<img src="a.png"><br>"#);
    }

    #[test]
    fn test_boolean_attribute_serialized_empty() {
        let doc = Document::parse("<input disabled>").unwrap();
        assert_eq!(doc.inner_html(doc.root()), r#"<input disabled="">"#);
    }
}
