//! Repeatable image fields.
//!
//! An array-valued image field renders one `<img>` per item. Existing
//! elements are reused positionally, the last one is cloned to grow the set,
//! and surplus elements are hidden rather than removed so listeners attached
//! to them by the host survive re-renders.

use crate::binding::{self, FieldIndex, FieldKey};
use crate::dom::Document;
use crate::record::FieldValue;

/// Companion quantity key: `product_main_src` → `product_main_qty`,
/// `gallery` → `gallery_qty`.
pub fn quantity_key(field: &str) -> String {
    let base = field.strip_suffix("_src").unwrap_or(field);
    format!("{}_qty", base)
}

/// Base list: the override list, else the record list, else the resolved
/// scalar (override before record) as a one-item list.
pub fn base_list(override_value: Option<&FieldValue>, record_value: Option<&FieldValue>) -> Vec<String> {
    if let Some(items) = override_value.and_then(FieldValue::as_list) {
        return items.to_vec();
    }
    if let Some(items) = record_value.and_then(FieldValue::as_list) {
        return items.to_vec();
    }
    override_value
        .or(record_value)
        .map(|v| vec![v.as_scalar()])
        .unwrap_or_default()
}

/// Target count: override quantity, else record quantity, else `default`.
///
/// A quantity that is present but not a non-negative integer means one copy.
pub fn resolve_quantity(
    override_qty: Option<&FieldValue>,
    record_qty: Option<&FieldValue>,
    default: usize,
    max: usize,
) -> usize {
    let count = match override_qty.or(record_qty) {
        Some(value) => value.as_quantity().unwrap_or_else(|| {
            tracing::debug!(?value, "unparseable quantity, rendering one copy");
            1
        }),
        None => default,
    };
    count.min(max)
}

/// Repeat `base` cyclically or truncate it to `count` items.
pub fn repeat_to(base: &[String], count: usize) -> Vec<String> {
    if base.is_empty() {
        return Vec::new();
    }
    base.iter().cycle().take(count).cloned().collect()
}

/// Make the image elements of `key` show `items`. Returns the number of
/// visible elements, or `None` when the field has no image element.
pub fn sync_elements(
    doc: &mut Document,
    index: &mut FieldIndex,
    key: &FieldKey,
    items: &[String],
) -> Option<usize> {
    let mut nodes = index.image_nodes(doc, key.as_str());
    let mut last = *nodes.last()?;

    while nodes.len() < items.len() {
        let clone = doc.clone_subtree(last);
        doc.insert_after(last, clone);
        index.insert_after(key, last, clone);
        nodes.push(clone);
        last = clone;
    }

    for (i, node) in nodes.iter().enumerate() {
        match items.get(i) {
            Some(src) => {
                binding::write_image_src(doc, *node, src);
                doc.set_hidden(*node, false);
            }
            None => doc.set_hidden(*node, true),
        }
    }
    Some(items.len())
}
