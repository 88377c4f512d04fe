//! Compound price field.
//!
//! One container holds an integer-part and a decimal-part sub-element. The
//! integer's digit count picks one of two layouts that share the same DOM
//! shape but use different classes:
//!
//! ```text
//! <div class="price price-2d" data-price-int="p_int" data-price-dec="p_dec">
//!   <span class="price-sign">€</span>
//!   <span class="price-int-2d">9</span>
//!   <span class="price-dec-2d">.99</span>
//! </div>
//! ```
//!
//! [`set_price`] is the only transition. After every call the container has
//! exactly one integer and one decimal sub-element of the current layout.

use serde::{Deserialize, Serialize};

use super::PricePart;
use crate::dom::{Document, NodeId};

/// Class of the currency sign marker.
pub const SIGN_CLASS: &str = "price-sign";

/// Class of the pre-layout decimal span that older templates carry.
pub const LEGACY_DECIMAL_CLASS: &str = "price-decimal";

/// The two visual layouts of a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLayout {
    /// Integer part of at most two digits.
    TwoDigit,
    /// Integer part of three or more digits.
    ThreeDigit,
}

impl PriceLayout {
    pub const ALL: [PriceLayout; 2] = [PriceLayout::TwoDigit, PriceLayout::ThreeDigit];

    /// Layout for an integer string.
    pub fn for_int(int_value: &str) -> Self {
        if int_value.trim().chars().count() <= 2 {
            Self::TwoDigit
        } else {
            Self::ThreeDigit
        }
    }

    /// Base class of the container.
    pub fn container_class(self) -> &'static str {
        match self {
            Self::TwoDigit => "price-2d",
            Self::ThreeDigit => "price-3d",
        }
    }

    pub fn int_class(self) -> &'static str {
        match self {
            Self::TwoDigit => "price-int-2d",
            Self::ThreeDigit => "price-int-3d",
        }
    }

    pub fn dec_class(self) -> &'static str {
        match self {
            Self::TwoDigit => "price-dec-2d",
            Self::ThreeDigit => "price-dec-3d",
        }
    }

    fn other(self) -> Self {
        match self {
            Self::TwoDigit => Self::ThreeDigit,
            Self::ThreeDigit => Self::TwoDigit,
        }
    }
}

/// Strip any leading dot so callers may pass `"99"` or `".99"`.
pub fn normalize_decimal(dec_value: &str) -> &str {
    dec_value.trim().trim_start_matches('.')
}

/// Write `int_value` and `dec_value` into a price container.
pub fn set_price(
    doc: &mut Document,
    container: NodeId,
    int_value: &str,
    dec_value: &str,
) -> PriceLayout {
    let int_value = int_value.trim();
    let layout = PriceLayout::for_int(int_value);

    doc.remove_class(container, layout.other().container_class());
    doc.add_class(container, layout.container_class());

    prune_legacy(doc, container, layout);

    let sign = find_by_class(doc, container, SIGN_CLASS).first().copied();

    let int_node = find_or_create(doc, container, layout.int_class(), |doc, el| match sign {
        Some(sign) => doc.insert_after(sign, el),
        None => doc.prepend_child(container, el),
    });
    if doc.text_content(int_node) != int_value {
        doc.set_text_content(int_node, int_value);
    }

    let dec_node = find_or_create(doc, container, layout.dec_class(), |doc, el| {
        doc.insert_after(int_node, el)
    });
    let dec_text = format!(".{}", normalize_decimal(dec_value));
    if doc.text_content(dec_node) != dec_text {
        doc.set_text_content(dec_node, &dec_text);
    }

    layout
}

/// Read one half of a price container; the decimal comes back without its dot.
pub fn read_part(doc: &Document, container: NodeId, part: PricePart) -> Option<String> {
    let layout = current_layout(doc, container);
    let class = match part {
        PricePart::Int => layout.int_class(),
        PricePart::Dec => layout.dec_class(),
    };
    let node = find_by_class(doc, container, class).first().copied()?;
    let text = doc.text_content(node);
    Some(match part {
        PricePart::Int => text.trim().to_string(),
        PricePart::Dec => normalize_decimal(&text).to_string(),
    })
}

/// Layout the container currently shows (defaults to two digits).
pub fn current_layout(doc: &Document, container: NodeId) -> PriceLayout {
    if doc.has_class(container, PriceLayout::ThreeDigit.container_class()) {
        PriceLayout::ThreeDigit
    } else {
        PriceLayout::TwoDigit
    }
}

/// Remove stale sub-elements: the other layout's parts, legacy decimal spans
/// and stray text right after the sign marker.
fn prune_legacy(doc: &mut Document, container: NodeId, layout: PriceLayout) {
    let other = layout.other();
    for class in [other.int_class(), other.dec_class(), LEGACY_DECIMAL_CLASS] {
        for node in find_by_class(doc, container, class) {
            doc.detach(node);
        }
    }
    for sign in find_by_class(doc, container, SIGN_CLASS) {
        while let Some(next) = doc.next_sibling(sign) {
            match doc.text(next) {
                Some(t) if !t.trim().is_empty() => doc.detach(next),
                _ => break,
            }
        }
    }
}

/// Find the first descendant with `class`, dropping duplicates; create one
/// with `insert` when none exists.
fn find_or_create(
    doc: &mut Document,
    container: NodeId,
    class: &str,
    insert: impl FnOnce(&mut Document, NodeId),
) -> NodeId {
    let found = find_by_class(doc, container, class);
    if let Some((first, duplicates)) = found.split_first() {
        for dup in duplicates {
            doc.detach(*dup);
        }
        return *first;
    }
    let el = doc.create_element("span");
    doc.set_class_name(el, class);
    insert(doc, el);
    el
}

fn find_by_class(doc: &Document, container: NodeId, class: &str) -> Vec<NodeId> {
    doc.descendants(container)
        .into_iter()
        .filter(|n| doc.has_class(*n, class))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(markup: &str) -> (Document, NodeId) {
        let doc = Document::parse(markup).unwrap();
        let c = doc.children(doc.root())[0];
        (doc, c)
    }

    fn count(doc: &Document, c: NodeId, class: &str) -> usize {
        find_by_class(doc, c, class).len()
    }

    #[test]
    fn test_creates_parts_after_sign() {
        let (mut doc, c) = container(r#"<div class="price"><span class="price-sign">€</span></div>"#);
        let layout = set_price(&mut doc, c, "9", "99");
        assert_eq!(layout, PriceLayout::TwoDigit);
        assert_eq!(
            doc.inner_html(c),
            r#"<span class="price-sign">€</span><span class="price-int-2d">9</span><span class="price-dec-2d">.99</span>"#
        );
        assert!(doc.has_class(c, "price"));
        assert!(doc.has_class(c, "price-2d"));
    }

    #[test]
    fn test_creates_parts_at_start_without_sign() {
        let (mut doc, c) = container(r#"<div><em>only</em></div>"#);
        set_price(&mut doc, c, "12", ".50");
        assert_eq!(
            doc.inner_html(c),
            r#"<span class="price-int-2d">12</span><span class="price-dec-2d">.50</span><em>only</em>"#
        );
    }

    #[test]
    fn test_digit_count_transition_removes_old_parts() {
        let (mut doc, c) = container(r#"<div class="price"></div>"#);
        set_price(&mut doc, c, "9", "99");
        let old_int = find_by_class(&doc, c, "price-int-2d")[0];
        let old_dec = find_by_class(&doc, c, "price-dec-2d")[0];

        let layout = set_price(&mut doc, c, "199", "00");
        assert_eq!(layout, PriceLayout::ThreeDigit);
        assert!(doc.has_class(c, "price-3d"));
        assert!(!doc.has_class(c, "price-2d"));
        assert!(!doc.is_attached(old_int));
        assert!(!doc.is_attached(old_dec));
        assert_eq!(count(&doc, c, "price-int-3d"), 1);
        assert_eq!(count(&doc, c, "price-dec-3d"), 1);
        assert_eq!(doc.text_content(c), "199.00");
    }

    #[test]
    fn test_idempotent() {
        let (mut doc, c) = container(r#"<div class="price"></div>"#);
        set_price(&mut doc, c, "5", "49");
        let once = doc.outer_html(c);
        set_price(&mut doc, c, "5", ".49");
        assert_eq!(doc.outer_html(c), once);
    }

    #[test]
    fn test_prunes_legacy_nodes_and_duplicates() {
        let (mut doc, c) = container(
            r#"<div><span class="price-sign">$</span>12<span class="price-int-2d">1</span><span class="price-int-2d">2</span><span class="price-decimal">.5</span></div>"#,
        );
        set_price(&mut doc, c, "7", "10");
        assert_eq!(count(&doc, c, "price-int-2d"), 1);
        assert_eq!(count(&doc, c, "price-dec-2d"), 1);
        assert_eq!(count(&doc, c, LEGACY_DECIMAL_CLASS), 0);
        assert_eq!(doc.text_content(c), "$7.10");
    }

    #[test]
    fn test_read_part() {
        let (mut doc, c) = container(r#"<div></div>"#);
        set_price(&mut doc, c, "249", "95");
        assert_eq!(read_part(&doc, c, PricePart::Int).as_deref(), Some("249"));
        assert_eq!(read_part(&doc, c, PricePart::Dec).as_deref(), Some("95"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn exactly_one_int_and_dec(int in "[0-9]{1,5}", dec in "[0-9]{0,2}", first in "[0-9]{1,5}") {
                let (mut doc, c) = container(r#"<div class="price"><span class="price-sign">€</span></div>"#);
                set_price(&mut doc, c, &first, "00");
                let layout = set_price(&mut doc, c, &int, &dec);
                prop_assert_eq!(layout == PriceLayout::TwoDigit, int.len() <= 2);
                prop_assert!(doc.has_class(c, layout.container_class()));
                prop_assert!(!doc.has_class(c, layout.other().container_class()));
                let ints = PriceLayout::ALL.iter().map(|l| count(&doc, c, l.int_class())).sum::<usize>();
                let decs = PriceLayout::ALL.iter().map(|l| count(&doc, c, l.dec_class())).sum::<usize>();
                prop_assert_eq!(ints, 1);
                prop_assert_eq!(decs, 1);
            }
        }
    }
}
