//! Snapshot → document.
//!
//! Restore is additive: keys with no element are skipped, and bound fields the
//! snapshot does not mention keep whatever they show.

use std::collections::BTreeMap;

use super::{ElementSnapshot, Snapshot, StyleProp};
use crate::binding::{self, FieldIndex, FieldKey, FieldKind, NOWRAP_DECLARATIONS, PricePart, price};
use crate::dom::{Document, NodeId};

/// What one restore did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<FieldKey>,
    pub skipped: Vec<FieldKey>,
}

/// Replay `snapshot` onto `doc`.
#[tracing::instrument(level = "debug", skip_all, fields(elements = snapshot.elements.len()))]
pub fn restore(doc: &mut Document, index: &FieldIndex, snapshot: &Snapshot) -> RestoreReport {
    let mut report = RestoreReport::default();
    let mut price_parts: BTreeMap<NodeId, (Option<&ElementSnapshot>, Option<&ElementSnapshot>)> =
        BTreeMap::new();

    for (key, element) in &snapshot.elements {
        let Some(kind) = index.kind(doc, key.as_str()) else {
            tracing::debug!(%key, "no element bound, skipping restore");
            report.skipped.push(key.clone());
            continue;
        };
        match kind {
            FieldKind::Image => {
                for node in index.image_nodes(doc, key.as_str()) {
                    if let Some(src) = &element.image_src {
                        binding::write_image_src(doc, node, src);
                    }
                    merge_style(doc, node, &element.style);
                }
            }
            FieldKind::Price(part) => {
                if let Some(binding) = index.price_for(key.as_str()) {
                    let slot = price_parts.entry(binding.container).or_default();
                    match part {
                        PricePart::Int => slot.0 = Some(element),
                        PricePart::Dec => slot.1 = Some(element),
                    }
                }
            }
            FieldKind::Text => {
                for node in index.nodes(key.as_str()).to_vec() {
                    restore_content(doc, node, element);
                    if let Some(class) = &element.class_name {
                        doc.set_class_name(node, class);
                    }
                    merge_style(doc, node, &element.style);
                }
            }
        }
        report.restored.push(key.clone());
    }

    for (container, (int_part, dec_part)) in price_parts {
        // Class first: set_price re-asserts the layout class afterwards.
        if let Some(class) = int_part.or(dec_part).and_then(|e| e.class_name.as_ref()) {
            doc.set_class_name(container, class);
        }
        let int_value = int_part
            .map(|e| e.content.clone())
            .or_else(|| price::read_part(doc, container, PricePart::Int))
            .unwrap_or_default();
        let dec_value = dec_part
            .map(|e| e.content.clone())
            .or_else(|| price::read_part(doc, container, PricePart::Dec))
            .unwrap_or_default();
        binding::set_price(doc, container, &int_value, &dec_value);
        if let Some(style) = int_part.or(dec_part).map(|e| &e.style) {
            merge_style(doc, container, style);
        }
    }

    report
}

/// Inner markup when present and parseable, text otherwise.
fn restore_content(doc: &mut Document, node: NodeId, element: &ElementSnapshot) {
    if !element.content.is_empty() {
        if doc.inner_html(node) == element.content {
            return;
        }
        match doc.set_inner_html(node, &element.content) {
            Ok(()) => return,
            Err(err) => tracing::debug!(%err, key = %element.key, "falling back to text restore"),
        }
    }
    if doc.text_content(node) != element.text {
        doc.set_text_content(node, &element.text);
    }
}

/// Drop every whitelisted declaration, then append the captured ones. Other
/// inline declarations stay where they are.
pub(crate) fn merge_style(doc: &mut Document, node: NodeId, style: &BTreeMap<StyleProp, String>) {
    let mut inline = doc.style(node);
    inline.remove_all(StyleProp::ALL.iter().map(|p| p.css_name()));
    for (prop, value) in style {
        inline.append(prop.css_name(), value.as_str());
    }
    if style.contains_key(&StyleProp::Width) {
        for (name, value) in NOWRAP_DECLARATIONS {
            inline.set(name, value);
        }
    }
    doc.set_style(node, &inline);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{BackgroundState, SnapshotMeta, capture};
    use pretty_assertions::assert_eq;

    const MARKUP: &str = r#"<div class="banner"><h1 data-field="title" class="headline" style="font-size: 24px; display: block; left: 10px">Big <b>Sale</b></h1><img data-field="pic" src="a.png"><img data-field="pic" src="b.png"><div class="price price-2d" data-price-int="p_int" data-price-dec="p_dec"><span class="price-sign">$</span><span class="price-int-2d">9</span><span class="price-dec-2d">.99</span></div></div>"#;

    fn fresh() -> (Document, FieldIndex) {
        let doc = Document::parse(MARKUP).unwrap();
        let index = FieldIndex::build(&doc);
        (doc, index)
    }

    fn snap(doc: &Document, index: &FieldIndex) -> Snapshot {
        capture(doc, index, &SnapshotMeta::default(), &BackgroundState::default())
    }

    #[test]
    fn test_roundtrip_on_same_document() {
        let (mut doc, index) = fresh();
        let before = snap(&doc, &index);
        restore(&mut doc, &index, &before);
        assert_eq!(snap(&doc, &index), before);
        let h1 = index.first("title").unwrap();
        assert_eq!(doc.style_property(h1, "display").as_deref(), Some("block"));
        assert_eq!(doc.inner_html(h1), "Big <b>Sale</b>");
    }

    #[test]
    fn test_restore_into_other_instance() {
        let (mut edited, index) = fresh();
        let h1 = index.first("title").unwrap();
        edited.set_text_content(h1, "Changed");
        edited.set_style_property(h1, "color", "blue");
        let pics = index.image_nodes(&edited, "pic");
        edited.set_attr(pics[0], "src", "z.png");
        let snapshot = snap(&edited, &index);

        let (mut target, target_index) = fresh();
        let report = restore(&mut target, &target_index, &snapshot);
        assert!(report.skipped.is_empty());
        let h1 = target_index.first("title").unwrap();
        assert_eq!(target.text_content(h1), "Changed");
        assert_eq!(target.style_property(h1, "color").as_deref(), Some("blue"));
        assert_eq!(target.style_property(h1, "display").as_deref(), Some("block"));
        for img in target_index.image_nodes(&target, "pic") {
            assert_eq!(target.attr(img, "src"), Some("z.png"));
        }
    }

    #[test]
    fn test_whitelisted_names_replaced_others_kept() {
        let (mut doc, index) = fresh();
        let mut snapshot = snap(&doc, &index);
        let title = snapshot.elements.get_mut("title").unwrap();
        title.style = BTreeMap::from([(StyleProp::Width, "120px".to_string())]);
        restore(&mut doc, &index, &snapshot);
        let h1 = index.first("title").unwrap();
        assert_eq!(
            doc.attr(h1, "style"),
            Some("display: block; width: 120px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis;")
        );
    }

    #[test]
    fn test_price_restored_through_state_machine() {
        let (mut source, index) = fresh();
        let container = index.prices()[0].container;
        binding::set_price(&mut source, container, "149", "50");
        let snapshot = snap(&source, &index);

        let (mut target, target_index) = fresh();
        restore(&mut target, &target_index, &snapshot);
        let container = target_index.prices()[0].container;
        assert!(target.has_class(container, "price-3d"));
        assert_eq!(target.text_content(container), "$149.50");
    }

    #[test]
    fn test_partial_restore_skips_unknown_and_keeps_missing() {
        let (mut doc, index) = fresh();
        let mut snapshot = Snapshot::default();
        snapshot.elements.insert(
            "ghost".into(),
            ElementSnapshot {
                key: "ghost".into(),
                tag: "p".into(),
                content: "boo".into(),
                text: "boo".into(),
                image_src: None,
                class_name: None,
                part: None,
                style: BTreeMap::new(),
            },
        );
        let html_before = doc.inner_html(doc.root());
        let report = restore(&mut doc, &index, &snapshot);
        assert_eq!(report.skipped, vec![FieldKey::new("ghost")]);
        assert_eq!(doc.inner_html(doc.root()), html_before);
    }

    #[test]
    fn test_text_fallback_when_markup_empty() {
        let (mut doc, index) = fresh();
        let mut snapshot = snap(&doc, &index);
        let title = snapshot.elements.get_mut("title").unwrap();
        title.content.clear();
        title.text = "Plain".into();
        restore(&mut doc, &index, &snapshot);
        assert_eq!(doc.text_content(index.first("title").unwrap()), "Plain");
    }
}
