//! # Document Binding Primitives
//!
//! Low-level reads and writes against a single named field inside a
//! [`Document`].
//!
//! ## Attribute Contract
//!
//! | Attribute | Meaning |
//! |-----------|---------|
//! | `data-field="title"` | element renders field `title` |
//! | `data-price-int="price_int"` | price container, integer-part key |
//! | `data-price-dec="price_dec"` | price container, decimal-part key |
//!
//! A key may appear on several elements (repeated image fields). When an
//! ancestor and a descendant are both bound, only the innermost binding
//! counts.
//!
//! ## Field Index
//!
//! [`FieldIndex::build`] walks the tree once per document attach and maps
//! every key to its elements in document order. The merge engine keeps it
//! current when it clones repeated elements, so nothing downstream rescans
//! the tree by attribute.

pub mod price;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::record::OverrideKey;

pub use price::{PriceLayout, set_price};

/// Attribute binding an element to a field key.
pub const FIELD_ATTR: &str = "data-field";

/// Attribute naming the integer-part key of a price container.
pub const PRICE_INT_ATTR: &str = "data-price-int";

/// Attribute naming the decimal-part key of a price container.
pub const PRICE_DEC_ATTR: &str = "data-price-dec";

/// Class marking the field the user is editing in the focus view.
pub const HIGHLIGHT_CLASS: &str = "bindery-highlight";

/// Tag name of image fields.
pub const IMAGE_TAG: &str = "img";

/// Name of a bound field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FieldKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Which half of a price field a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePart {
    Int,
    Dec,
}

/// How a bound field is read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `<img>` element: value is the `src`.
    Image,
    /// Any other element: value is the text content.
    Text,
    /// One half of a price container.
    Price(PricePart),
}

/// A price container and its two keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBinding {
    pub container: NodeId,
    pub int_key: FieldKey,
    pub dec_key: FieldKey,
}

/// Map from field key to bound elements, built once per document.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    fields: BTreeMap<FieldKey, Vec<NodeId>>,
    prices: Vec<PriceBinding>,
}

impl FieldIndex {
    /// Index every bound element of `doc`.
    ///
    /// An element with a bound descendant is skipped (innermost binding
    /// wins). Price containers are indexed under both of their keys.
    pub fn build(doc: &Document) -> Self {
        let mut index = Self::default();
        let bound: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|n| is_bound(doc, *n))
            .collect();

        for node in bound {
            let shadowed = doc.descendants(node).iter().any(|d| is_bound(doc, *d));
            if shadowed {
                tracing::debug!(%node, "ignoring outer binding with a bound descendant");
                continue;
            }
            if let Some(key) = doc.attr(node, FIELD_ATTR).filter(|k| !k.is_empty()) {
                index.fields.entry(FieldKey::new(key)).or_default().push(node);
            }
            let int_key = doc.attr(node, PRICE_INT_ATTR).filter(|k| !k.is_empty());
            let dec_key = doc.attr(node, PRICE_DEC_ATTR).filter(|k| !k.is_empty());
            if let (Some(int_key), Some(dec_key)) = (int_key, dec_key) {
                let binding = PriceBinding {
                    container: node,
                    int_key: FieldKey::new(int_key),
                    dec_key: FieldKey::new(dec_key),
                };
                index
                    .fields
                    .entry(binding.int_key.clone())
                    .or_default()
                    .push(node);
                index
                    .fields
                    .entry(binding.dec_key.clone())
                    .or_default()
                    .push(node);
                index.prices.push(binding);
            }
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    /// Elements bound to `key`, in document order.
    pub fn nodes(&self, key: &str) -> &[NodeId] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first element bound to `key`.
    pub fn first(&self, key: &str) -> Option<NodeId> {
        self.nodes(key).first().copied()
    }

    /// Image elements bound to `key`, in document order.
    pub fn image_nodes(&self, doc: &Document, key: &str) -> Vec<NodeId> {
        self.nodes(key)
            .iter()
            .copied()
            .filter(|n| doc.tag(*n) == Some(IMAGE_TAG))
            .collect()
    }

    pub fn prices(&self) -> &[PriceBinding] {
        &self.prices
    }

    /// True when `key` names an element or a price half.
    pub fn binds(&self, key: &str) -> bool {
        self.contains(key) || self.price_for(key).is_some()
    }

    /// Classify an override or record key. A key the template binds is a
    /// direct value even when its name fits the transform or width grammar.
    pub fn override_key(&self, key: &str) -> OverrideKey {
        if self.binds(key) {
            OverrideKey::Direct(FieldKey::new(key))
        } else {
            OverrideKey::parse(key)
        }
    }

    /// The price binding that owns `key`, if any.
    pub fn price_for(&self, key: &str) -> Option<&PriceBinding> {
        self.prices
            .iter()
            .find(|p| p.int_key.as_str() == key || p.dec_key.as_str() == key)
    }

    /// Classify `key` by its first element.
    pub fn kind(&self, doc: &Document, key: &str) -> Option<FieldKind> {
        if let Some(price) = self.price_for(key) {
            let part = if price.int_key.as_str() == key {
                PricePart::Int
            } else {
                PricePart::Dec
            };
            return Some(FieldKind::Price(part));
        }
        let first = self.first(key)?;
        if doc.tag(first) == Some(IMAGE_TAG) {
            Some(FieldKind::Image)
        } else {
            Some(FieldKind::Text)
        }
    }

    /// Register a freshly inserted clone of a repeated element.
    pub(crate) fn insert_after(&mut self, key: &FieldKey, after: NodeId, node: NodeId) {
        let nodes = self.fields.entry(key.clone()).or_default();
        match nodes.iter().position(|n| *n == after) {
            Some(pos) => nodes.insert(pos + 1, node),
            None => nodes.push(node),
        }
    }

    /// True when every key in `keys` has at least one element.
    pub fn has_all<'a>(&self, mut keys: impl Iterator<Item = &'a FieldKey>) -> bool {
        keys.all(|k| self.contains(k.as_str()))
    }
}

fn is_bound(doc: &Document, node: NodeId) -> bool {
    doc.has_attr(node, FIELD_ATTR)
        || (doc.has_attr(node, PRICE_INT_ATTR) && doc.has_attr(node, PRICE_DEC_ATTR))
}

// ============================================================================
// FIELD PRIMITIVES
// ============================================================================

/// Current value of `key` as displayed: `src` for images, the part text for
/// price halves (decimal without its dot), text content otherwise.
pub fn read_field(doc: &Document, index: &FieldIndex, key: &str) -> Option<String> {
    let node = index.first(key)?;
    match index.kind(doc, key)? {
        FieldKind::Image => doc.attr(node, "src").map(str::to_string),
        FieldKind::Text => Some(doc.text_content(node)),
        FieldKind::Price(part) => price::read_part(doc, node, part),
    }
}

/// Set the text content of every element bound to `key`.
pub fn write_text(doc: &mut Document, index: &FieldIndex, key: &str, value: &str) -> usize {
    let nodes = index.nodes(key);
    for node in nodes {
        if doc.text_content(*node) != value {
            doc.set_text_content(*node, value);
        }
    }
    nodes.len()
}

/// Set the inner markup of every element bound to `key`. An element whose
/// markup cannot be parsed keeps its content.
pub fn write_markup(doc: &mut Document, index: &FieldIndex, key: &str, markup: &str) -> usize {
    let nodes = index.nodes(key);
    for node in nodes {
        if doc.inner_html(*node) == markup {
            continue;
        }
        if let Err(err) = doc.set_inner_html(*node, markup) {
            tracing::debug!(%err, key, "markup not written");
        }
    }
    nodes.len()
}

/// Set `src` on one image element.
pub fn write_image_src(doc: &mut Document, node: NodeId, src: &str) {
    if doc.attr(node, "src") != Some(src) {
        doc.set_attr(node, "src", src);
    }
}

/// A drag/scale adjustment of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementTransform {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for ElementTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl ElementTransform {
    /// CSS `transform` value: `translate(Xpx, Ypx) scale(S)`.
    pub fn to_css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            fmt_number(self.x),
            fmt_number(self.y),
            fmt_number(self.scale)
        )
    }

    /// Parse the CSS this type produces (scale optional).
    pub fn from_css(css: &str) -> Option<Self> {
        let css = css.trim();
        let rest = css.strip_prefix("translate(")?;
        let (args, tail) = rest.split_once(')')?;
        let (x, y) = args.split_once(',')?;
        let x = parse_px(x)?;
        let y = parse_px(y)?;
        let tail = tail.trim();
        let scale = if tail.is_empty() {
            1.0
        } else {
            let inner = tail.strip_prefix("scale(")?.strip_suffix(')')?;
            inner.trim().parse().ok()?
        };
        Some(Self { x, y, scale })
    }
}

/// Transform origin applied with every per-element transform.
pub const TRANSFORM_ORIGIN: &str = "center center";

/// Apply `transform` to one element.
pub fn apply_transform(doc: &mut Document, node: NodeId, transform: &ElementTransform) {
    let mut style = doc.style(node);
    style.set("transform", transform.to_css());
    style.set("transform-origin", TRANSFORM_ORIGIN);
    doc.set_style(node, &style);
}

/// Declarations added whenever an explicit width is applied.
pub const NOWRAP_DECLARATIONS: [(&str, &str); 3] = [
    ("white-space", "nowrap"),
    ("overflow", "hidden"),
    ("text-overflow", "ellipsis"),
];

/// Apply an explicit pixel width to one element.
pub fn apply_width(doc: &mut Document, node: NodeId, width_px: f64) {
    let mut style = doc.style(node);
    style.set("width", format!("{}px", fmt_number(width_px)));
    for (name, value) in NOWRAP_DECLARATIONS {
        style.set(name, value);
    }
    doc.set_style(node, &style);
}

/// Add or remove the highlight class on every element bound to `key`.
pub fn set_highlight(doc: &mut Document, index: &FieldIndex, key: &str, on: bool) {
    for node in index.nodes(key) {
        if on {
            doc.add_class(*node, HIGHLIGHT_CLASS);
        } else {
            doc.remove_class(*node, HIGHLIGHT_CLASS);
        }
    }
}

/// Remove the highlight class from every bound element.
pub fn clear_highlights(doc: &mut Document, index: &FieldIndex) {
    for key in index.keys() {
        set_highlight(doc, index, key.as_str(), false);
    }
}

/// Parse `"12"`, `"12px"` or `" 12.5px "` to a number.
pub fn parse_px(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_suffix("px").unwrap_or(s).trim();
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Format a number without a trailing `.0`.
pub fn fmt_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
