//! Document → snapshot.

use std::collections::BTreeMap;

use super::{BackgroundState, ElementSnapshot, Snapshot, SnapshotMeta, StyleProp};
use crate::binding::{self, FieldIndex, FieldKind, HIGHLIGHT_CLASS, price};
use crate::dom::{Document, NodeId};

/// Source of computed style values the inline style does not carry.
///
/// A browser host answers from its layout engine; headless callers use
/// [`InlineStyles`].
pub trait StyleResolver {
    fn computed(&self, doc: &Document, node: NodeId, prop: StyleProp) -> Option<String>;
}

/// Reports nothing beyond inline declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineStyles;

impl StyleResolver for InlineStyles {
    fn computed(&self, _doc: &Document, _node: NodeId, _prop: StyleProp) -> Option<String> {
        None
    }
}

/// Capture every bound field of `doc` using inline styles only.
pub fn capture(
    doc: &Document,
    index: &FieldIndex,
    meta: &SnapshotMeta,
    background: &BackgroundState,
) -> Snapshot {
    capture_with(doc, index, meta, background, &InlineStyles)
}

/// Capture every bound field of `doc`, asking `resolver` for values the inline
/// style lacks.
#[tracing::instrument(level = "debug", skip_all, fields(fields = index.len()))]
pub fn capture_with<R: StyleResolver + ?Sized>(
    doc: &Document,
    index: &FieldIndex,
    meta: &SnapshotMeta,
    background: &BackgroundState,
    resolver: &R,
) -> Snapshot {
    let mut elements = BTreeMap::new();
    for key in index.keys() {
        // Image fields use the first element as representative.
        let Some(node) = index.first(key.as_str()) else {
            continue;
        };
        let Some(kind) = index.kind(doc, key.as_str()) else {
            continue;
        };
        let tag = doc.tag(node).unwrap_or_default().to_string();

        let (content, text, image_src, part) = match kind {
            FieldKind::Image => {
                let src = doc.attr(node, "src").unwrap_or_default().to_string();
                (String::new(), String::new(), Some(src), None)
            }
            FieldKind::Price(part) => {
                let value = price::read_part(doc, node, part).unwrap_or_default();
                (value.clone(), value, None, Some(part))
            }
            FieldKind::Text => (doc.inner_html(node), doc.text_content(node), None, None),
        };

        elements.insert(
            key.clone(),
            ElementSnapshot {
                key: key.clone(),
                tag,
                content,
                text,
                image_src,
                class_name: Some(class_without_highlight(doc.class_name(node))),
                part,
                style: capture_style(doc, node, resolver),
            },
        );
    }

    tracing::debug!(elements = elements.len(), "snapshot captured");
    Snapshot {
        meta: meta.clone(),
        background: background.clone(),
        elements,
    }
}

fn capture_style<R: StyleResolver + ?Sized>(
    doc: &Document,
    node: NodeId,
    resolver: &R,
) -> BTreeMap<StyleProp, String> {
    let inline = doc.style(node);
    let mut style = BTreeMap::new();
    for prop in StyleProp::ALL {
        let value = inline
            .get(prop.css_name())
            .map(str::to_string)
            .or_else(|| resolver.computed(doc, node, prop));
        let Some(value) = value else {
            continue;
        };
        if prop.is_default(&value) {
            continue;
        }
        let value = match prop {
            StyleProp::Transform => normalize_transform(&value),
            _ => value.trim().to_string(),
        };
        style.insert(prop, value);
    }
    style
}

fn class_without_highlight(class: &str) -> String {
    class
        .split_whitespace()
        .filter(|c| *c != HIGHLIGHT_CLASS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `matrix(1, 0, 0, 1, e, f)` becomes `translate(epx, fpx)`; anything else is
/// kept verbatim.
pub fn normalize_transform(value: &str) -> String {
    let value = value.trim();
    let Some(args) = value
        .strip_prefix("matrix(")
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return value.to_string();
    };
    let nums: Option<Vec<f64>> = args.split(',').map(|a| a.trim().parse().ok()).collect();
    match nums.as_deref() {
        Some([a, b, c, d, e, f]) if *a == 1.0 && *b == 0.0 && *c == 0.0 && *d == 1.0 => {
            format!(
                "translate({}px, {}px)",
                binding::fmt_number(*e),
                binding::fmt_number(*f)
            )
        }
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MARKUP: &str = r#"<h1 data-field="title" class="headline bindery-highlight" style="font-size: 24px; opacity: 1; color: red; display: block">Big <b>Sale</b></h1><img data-field="pic" src="a.png" style="transform: matrix(1, 0, 0, 1, 12, -3)"><img data-field="pic" src="b.png"><div data-price-int="p_int" data-price-dec="p_dec" class="price-2d"><span class="price-int-2d">9</span><span class="price-dec-2d">.99</span></div>"#;

    fn snap() -> Snapshot {
        let doc = Document::parse(MARKUP).unwrap();
        let index = FieldIndex::build(&doc);
        capture(&doc, &index, &SnapshotMeta::default(), &BackgroundState::default())
    }

    #[test]
    fn test_text_field_capture() {
        let s = snap();
        let title = s.get("title").unwrap();
        assert_eq!(title.tag, "h1");
        assert_eq!(title.content, "Big <b>Sale</b>");
        assert_eq!(title.text, "Big Sale");
        assert_eq!(title.class_name.as_deref(), Some("headline"));
        // Default opacity and non-whitelisted display are not recorded.
        assert_eq!(
            title.style,
            BTreeMap::from([
                (StyleProp::FontSize, "24px".to_string()),
                (StyleProp::Color, "red".to_string()),
            ])
        );
    }

    #[test]
    fn test_image_uses_first_element() {
        let s = snap();
        let pic = s.get("pic").unwrap();
        assert_eq!(pic.image_src.as_deref(), Some("a.png"));
        assert_eq!(pic.style_value(StyleProp::Transform), Some("translate(12px, -3px)"));
    }

    #[test]
    fn test_price_parts_captured() {
        let s = snap();
        assert_eq!(s.get("p_int").unwrap().content, "9");
        assert_eq!(s.get("p_int").unwrap().part, Some(crate::binding::PricePart::Int));
        assert_eq!(s.get("p_dec").unwrap().content, "99");
    }

    #[test]
    fn test_compound_transform_kept() {
        assert_eq!(
            normalize_transform("matrix(2, 0, 0, 2, 5, 5)"),
            "matrix(2, 0, 0, 2, 5, 5)"
        );
        assert_eq!(
            normalize_transform("translate(3px, 4px) scale(1.5)"),
            "translate(3px, 4px) scale(1.5)"
        );
        assert_eq!(normalize_transform("matrix(1, 0, 0, 1, 0.5, 0)"), "translate(0.5px, 0px)");
    }

    struct FixedFont;

    impl StyleResolver for FixedFont {
        fn computed(&self, _doc: &Document, _node: NodeId, prop: StyleProp) -> Option<String> {
            match prop {
                StyleProp::FontFamily => Some("Inter".into()),
                StyleProp::FontWeight => Some("400".into()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_resolver_fills_missing_values() {
        let doc = Document::parse(r#"<p data-field="t" style="font-family: Serif">x</p><p data-field="u">y</p>"#)
            .unwrap();
        let index = FieldIndex::build(&doc);
        let s = capture_with(
            &doc,
            &index,
            &SnapshotMeta::default(),
            &BackgroundState::default(),
            &FixedFont,
        );
        assert_eq!(s.get("t").unwrap().style_value(StyleProp::FontFamily), Some("Serif"));
        assert_eq!(s.get("u").unwrap().style_value(StyleProp::FontFamily), Some("Inter"));
        assert_eq!(s.get("u").unwrap().style_value(StyleProp::FontWeight), None);
    }
}
