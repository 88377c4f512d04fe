//! # Field Merge Engine
//!
//! Writes `Record ⊕ Overrides` into one document. Overrides beat record
//! values; record values beat whatever the template shows.
//!
//! ```
//! use bindery::dom::Document;
//! use bindery::binding::FieldIndex;
//! use bindery::config::EngineConfig;
//! use bindery::merge::apply_record;
//! use bindery::record::{OverrideMap, Record, RecordId};
//!
//! let mut doc = Document::parse(r#"<h1 data-field="title">Template</h1>"#).unwrap();
//! let mut index = FieldIndex::build(&doc);
//! let record = Record::new().with("title", "From data");
//! let mut overrides = OverrideMap::new();
//! overrides.set(RecordId(1), "title", "Edited".into());
//!
//! apply_record(&mut doc, &mut index, &record, RecordId(1), &overrides, &EngineConfig::default());
//! assert_eq!(doc.text_content(index.first("title").unwrap()), "Edited");
//! ```
//!
//! The engine only touches the document (and the index, when repeated
//! elements are cloned); records and overrides are read-only.

pub mod repeat;

use std::collections::BTreeSet;

use crate::binding::{self, FieldIndex, FieldKey, FieldKind, PricePart, price};
use crate::config::EngineConfig;
use crate::dom::Document;
use crate::record::{FieldValue, OverrideKey, OverrideMap, Record, RecordId, RecordOverrides};

/// What one merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Keys written into the document.
    pub written: Vec<String>,
    /// Keys with a value but no matching element.
    pub skipped: Vec<String>,
}

/// Values for one record: overrides first, then the record.
struct Resolver<'a> {
    record: &'a Record,
    overrides: Option<&'a RecordOverrides>,
}

impl<'a> Resolver<'a> {
    fn override_value(&self, key: &str) -> Option<&'a FieldValue> {
        self.overrides.and_then(|o| o.get(key))
    }

    fn record_value(&self, key: &str) -> Option<&'a FieldValue> {
        self.record.get(key)
    }

    fn get(&self, key: &str) -> Option<&'a FieldValue> {
        self.override_value(key).or_else(|| self.record_value(key))
    }

    /// Every key with a value, overrides and record combined.
    fn keys(&self) -> BTreeSet<&'a str> {
        let mut keys: BTreeSet<&'a str> = self.record.keys().collect();
        if let Some(o) = self.overrides {
            keys.extend(o.keys().map(String::as_str));
        }
        keys
    }

    /// A field renders as a repeat set when either source holds a list or a
    /// quantity is given.
    fn is_repeatable(&self, key: &str) -> bool {
        let is_list = |v: Option<&FieldValue>| matches!(v, Some(FieldValue::List(_)));
        is_list(self.override_value(key))
            || is_list(self.record_value(key))
            || self.get(&repeat::quantity_key(key)).is_some()
    }
}

/// Merge `record` and `overrides[id]` into `doc`.
#[tracing::instrument(level = "debug", skip_all, fields(record = %id))]
pub fn apply_record(
    doc: &mut Document,
    index: &mut FieldIndex,
    record: &Record,
    id: RecordId,
    overrides: &OverrideMap,
    config: &EngineConfig,
) -> MergeReport {
    let resolver = Resolver {
        record,
        overrides: overrides.for_record(id),
    };
    let mut report = MergeReport::default();
    let mut aux = Vec::new();
    let mut prices_done = BTreeSet::new();

    for key in resolver.keys() {
        let parsed = index.override_key(key);
        if !matches!(parsed, OverrideKey::Direct(_)) {
            aux.push((parsed, key));
            continue;
        }

        if let Some(binding) = index.price_for(key).cloned() {
            if prices_done.insert(binding.container) {
                let current = |part| price::read_part(doc, binding.container, part);
                let int_value = resolver
                    .get(binding.int_key.as_str())
                    .map(FieldValue::as_scalar)
                    .or_else(|| current(PricePart::Int))
                    .unwrap_or_default();
                let dec_value = resolver
                    .get(binding.dec_key.as_str())
                    .map(FieldValue::as_scalar)
                    .or_else(|| current(PricePart::Dec))
                    .unwrap_or_default();
                binding::set_price(doc, binding.container, &int_value, &dec_value);
            }
            report.written.push(key.to_string());
            continue;
        }

        let Some(value) = resolver.get(key) else {
            continue;
        };
        match index.kind(doc, key) {
            None => {
                tracing::debug!(key, "no element bound, skipping");
                report.skipped.push(key.to_string());
            }
            Some(FieldKind::Image) if resolver.is_repeatable(key) => {
                let base = repeat::base_list(resolver.override_value(key), resolver.record_value(key));
                let qty_key = repeat::quantity_key(key);
                let count = repeat::resolve_quantity(
                    resolver.override_value(&qty_key),
                    resolver.record_value(&qty_key),
                    base.len(),
                    config.max_repeat,
                );
                let items = repeat::repeat_to(&base, count);
                repeat::sync_elements(doc, index, &FieldKey::new(key), &items);
                report.written.push(key.to_string());
            }
            Some(FieldKind::Image) => {
                let src = value.as_scalar();
                for node in index.image_nodes(doc, key) {
                    binding::write_image_src(doc, node, &src);
                }
                report.written.push(key.to_string());
            }
            Some(FieldKind::Text) => {
                match value {
                    FieldValue::Markup(markup) => binding::write_markup(doc, index, key, markup),
                    other => binding::write_text(doc, index, key, &other.as_scalar()),
                };
                report.written.push(key.to_string());
            }
            Some(FieldKind::Price(_)) => {}
        }
    }

    // Per-element state last, so clones made above are addressable.
    for (parsed, key) in aux {
        let Some(value) = resolver.get(key) else {
            continue;
        };
        match parsed {
            OverrideKey::Transform { field, index: i } => {
                let nodes = index.image_nodes(doc, field.as_str());
                match (nodes.get(i), value.as_transform()) {
                    (Some(node), Some(transform)) => {
                        binding::apply_transform(doc, *node, &transform);
                        report.written.push(key.to_string());
                    }
                    _ => {
                        tracing::debug!(key, "transform target or value missing, skipping");
                        report.skipped.push(key.to_string());
                    }
                }
            }
            OverrideKey::Width(field) => {
                let nodes = index.nodes(field.as_str()).to_vec();
                match binding::parse_px(&value.as_scalar()) {
                    Some(width) if !nodes.is_empty() => {
                        for node in nodes {
                            binding::apply_width(doc, node, width);
                        }
                        report.written.push(key.to_string());
                    }
                    _ => {
                        tracing::debug!(key, "width target or value missing, skipping");
                        report.skipped.push(key.to_string());
                    }
                }
            }
            OverrideKey::Direct(_) => {}
        }
    }

    report
}
