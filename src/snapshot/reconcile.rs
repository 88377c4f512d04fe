//! Snapshot → override map.
//!
//! After a restore the Override Map must describe what the views now show,
//! or the next merge would paint the pre-restore values back. For each
//! restored field the restored value is compared with the raw value (the
//! record's, else the template's own):
//!
//! | Restored vs raw | Override |
//! |-----------------|----------|
//! | equal | removed |
//! | different | set to the restored value |
//!
//! Image sources are compared by [`normalize_image_path`]; everything else by
//! exact equality. Text fields compare their text; a differing field whose
//! restored content carries markup is kept as [`FieldValue::Markup`].

use super::{ElementSnapshot, Snapshot, StyleProp};
use crate::binding::{self, ElementTransform, FieldIndex, FieldKey, FieldKind, PricePart, price};
use crate::dom::Document;
use crate::merge::repeat;
use crate::record::{FieldValue, OverrideKey, OverrideMap, Record, RecordId};
use crate::template::Template;

/// Override keys touched by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub set: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileReport {
    fn keep_or_drop(
        &mut self,
        overrides: &mut OverrideMap,
        id: RecordId,
        key: String,
        restored: Option<FieldValue>,
    ) {
        match restored {
            Some(value) => {
                if overrides.get(id, &key) != Some(&value) {
                    overrides.set(id, key.clone(), value);
                    self.set.push(key);
                }
            }
            None => {
                if overrides.remove(id, &key).is_some() {
                    self.removed.push(key);
                }
            }
        }
    }
}

/// Strip scheme, host, `./` and leading `/` so that `https://cdn/x/a.png`,
/// `/x/a.png` and `./x/a.png` compare equal. `data:` URIs are returned as-is.
pub fn normalize_image_path(src: &str) -> String {
    let src = src.trim();
    if src.starts_with("data:") {
        return src.to_string();
    }
    let without_host = match src.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => match src.strip_prefix("//") {
            Some(rest) => rest.find('/').map_or("", |i| &rest[i..]),
            None => src,
        },
    };
    let mut path = without_host;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.to_string()
}

fn same_image(a: &str, b: &str) -> bool {
    normalize_image_path(a) == normalize_image_path(b)
}

/// Bring `overrides[id]` in line with `snapshot` after it was restored into
/// `doc`.
#[tracing::instrument(level = "debug", skip_all, fields(record = %id))]
pub fn reconcile_overrides(
    doc: &Document,
    index: &FieldIndex,
    snapshot: &Snapshot,
    record: &Record,
    template: &Template,
    id: RecordId,
    overrides: &mut OverrideMap,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let raw_scalar = |key: &str| -> String {
        record
            .get(key)
            .map(FieldValue::as_scalar)
            .or_else(|| template.default_value(key).map(str::to_string))
            .unwrap_or_default()
    };

    for (key, element) in &snapshot.elements {
        let key = key.as_str();
        let Some(kind) = index.kind(doc, key) else {
            continue;
        };
        match kind {
            FieldKind::Image => {
                let restored = reconcile_image(doc, index, key, element, record, overrides, id, &raw_scalar);
                report.keep_or_drop(overrides, id, key.to_string(), restored);
                reconcile_transforms(doc, index, key, element, record, overrides, id, &mut report);
            }
            FieldKind::Price(part) => {
                let (restored, raw) = match part {
                    PricePart::Int => (element.content.trim().to_string(), raw_scalar(key).trim().to_string()),
                    PricePart::Dec => (
                        price::normalize_decimal(&element.content).to_string(),
                        price::normalize_decimal(&raw_scalar(key)).to_string(),
                    ),
                };
                let value = (restored != raw).then(|| FieldValue::Text(restored));
                report.keep_or_drop(overrides, id, key.to_string(), value);
            }
            FieldKind::Text => {
                let value = (element.text != raw_scalar(key)).then(|| restored_text(element));
                report.keep_or_drop(overrides, id, key.to_string(), value);
                reconcile_width(index, key, element, record, template, overrides, id, &mut report);
            }
        }
    }

    if !report.set.is_empty() || !report.removed.is_empty() {
        tracing::debug!(set = ?report.set, removed = ?report.removed, "overrides reconciled");
    }
    report
}

/// Serialized inner markup escapes `<` in text, so a `<` means an element.
fn restored_text(element: &ElementSnapshot) -> FieldValue {
    if element.content.contains('<') {
        FieldValue::Markup(element.content.clone())
    } else {
        FieldValue::Text(element.text.clone())
    }
}

/// Restored value of an image field, or `None` when it matches the raw one.
#[allow(clippy::too_many_arguments)]
fn reconcile_image(
    doc: &Document,
    index: &FieldIndex,
    key: &str,
    element: &ElementSnapshot,
    record: &Record,
    overrides: &OverrideMap,
    id: RecordId,
    raw_scalar: &dyn Fn(&str) -> String,
) -> Option<FieldValue> {
    let record_value = record.get(key);
    let override_value = overrides.get(id, key);
    let is_list = |v: Option<&FieldValue>| matches!(v, Some(FieldValue::List(_)));

    if is_list(record_value) || is_list(override_value) {
        let shown: Vec<String> = index
            .image_nodes(doc, key)
            .into_iter()
            .filter(|n| !doc.is_hidden(*n))
            .filter_map(|n| doc.attr(n, "src").map(str::to_string))
            .collect();
        // What a merge without the field override would render.
        let qty_key = repeat::quantity_key(key);
        let base = repeat::base_list(None, record_value);
        let count = repeat::resolve_quantity(
            overrides.get(id, &qty_key),
            record.get(&qty_key),
            base.len(),
            usize::MAX,
        );
        let raw = repeat::repeat_to(&base, count);
        let equal = raw.len() == shown.len() && raw.iter().zip(&shown).all(|(a, b)| same_image(a, b));
        return (!equal).then_some(FieldValue::List(shown));
    }

    let restored = element.image_src.clone().unwrap_or_default();
    (!same_image(&restored, &raw_scalar(key))).then_some(FieldValue::Text(restored))
}

#[allow(clippy::too_many_arguments)]
fn reconcile_transforms(
    doc: &Document,
    index: &FieldIndex,
    key: &str,
    element: &ElementSnapshot,
    record: &Record,
    overrides: &mut OverrideMap,
    id: RecordId,
    report: &mut ReconcileReport,
) {
    let restored_css = element.style_value(StyleProp::Transform);
    let restored = restored_css.map(ElementTransform::from_css);
    let field = FieldKey::new(key);

    // Restore wrote the representative style onto every image element.
    for i in 0..index.image_nodes(doc, key).len() {
        let override_key = OverrideKey::transform(&field, i);
        if index.binds(&override_key) {
            continue;
        }
        let raw = record
            .get(&override_key)
            .and_then(FieldValue::as_transform)
            .unwrap_or_default();
        let value = match restored {
            None => None,
            Some(Some(t)) if t == raw => None,
            Some(Some(t)) => Some(FieldValue::Transform(t)),
            // A compound transform the grammar cannot express stays as is.
            Some(None) => continue,
        };
        report.keep_or_drop(overrides, id, override_key, value);
    }
}

#[allow(clippy::too_many_arguments)]
fn reconcile_width(
    index: &FieldIndex,
    key: &str,
    element: &ElementSnapshot,
    record: &Record,
    template: &Template,
    overrides: &mut OverrideMap,
    id: RecordId,
    report: &mut ReconcileReport,
) {
    let override_key = OverrideKey::width(&FieldKey::new(key));
    // The name belongs to a bound field of its own.
    if index.binds(&override_key) {
        return;
    }
    let raw = record
        .get(&override_key)
        .and_then(|v| binding::parse_px(&v.as_scalar()))
        .or_else(|| template.default_width(key));
    let value = match element.style_value(StyleProp::Width).and_then(binding::parse_px) {
        None => None,
        Some(w) if raw.is_some_and(|r| (r - w).abs() < 0.5) => None,
        Some(w) => Some(FieldValue::Text(binding::fmt_number(w))),
    };
    report.keep_or_drop(overrides, id, override_key, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{BackgroundState, SnapshotMeta, capture, restore};
    use pretty_assertions::assert_eq;

    const MARKUP: &str = r#"<h1 data-field="title">A</h1><img data-field="pic" src="/assets/a.png"><div class="price-2d" data-price-int="p_int" data-price-dec="p_dec"><span class="price-int-2d">9</span><span class="price-dec-2d">.99</span></div>"#;

    fn snapshot_of(template: &Template, edit: impl FnOnce(&mut Document, &FieldIndex)) -> Snapshot {
        let mut doc = template.instantiate();
        let index = FieldIndex::build(&doc);
        edit(&mut doc, &index);
        capture(&doc, &index, &SnapshotMeta::default(), &BackgroundState::default())
    }

    fn reconcile(
        template: &Template,
        snapshot: &Snapshot,
        record: &Record,
        overrides: &mut OverrideMap,
    ) -> ReconcileReport {
        let mut doc = template.instantiate();
        let index = FieldIndex::build(&doc);
        restore(&mut doc, &index, snapshot);
        reconcile_overrides(&doc, &index, snapshot, record, template, RecordId(1), overrides)
    }

    #[test]
    fn test_normalize_image_path() {
        assert_eq!(normalize_image_path("https://cdn.example.com/x/a.png"), "x/a.png");
        assert_eq!(normalize_image_path("//cdn.example.com/x/a.png"), "x/a.png");
        assert_eq!(normalize_image_path("/x/a.png"), "x/a.png");
        assert_eq!(normalize_image_path("./x/a.png"), "x/a.png");
        assert_eq!(normalize_image_path("data:image/png;base64,AAA"), "data:image/png;base64,AAA");
    }

    #[test]
    fn test_restored_default_removes_override() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |_, _| {});
        let mut overrides = OverrideMap::new();
        overrides.set(RecordId(1), "title", "B".into());
        let report = reconcile(&template, &snapshot, &Record::new(), &mut overrides);
        assert_eq!(report.removed, vec!["title".to_string()]);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_differing_value_becomes_override() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::write_text(doc, index, "title", "Edited");
        });
        let mut overrides = OverrideMap::new();
        reconcile(&template, &snapshot, &Record::new().with("title", "Data"), &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "title"), Some(&FieldValue::from("Edited")));
    }

    #[test]
    fn test_formatted_text_kept_as_markup() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::write_markup(doc, index, "title", "Big <b>Sale</b>");
        });
        let mut overrides = OverrideMap::new();
        reconcile(&template, &snapshot, &Record::new(), &mut overrides);
        let value = overrides.get(RecordId(1), "title").cloned();
        assert_eq!(value, Some(FieldValue::Markup("Big <b>Sale</b>".into())));

        // A fresh merge of the reconciled overrides keeps the formatting.
        let mut doc = template.instantiate();
        let mut index = FieldIndex::build(&doc);
        let config = crate::config::EngineConfig::default();
        crate::merge::apply_record(&mut doc, &mut index, &Record::new(), RecordId(1), &overrides, &config);
        let h1 = index.first("title").unwrap();
        assert_eq!(doc.inner_html(h1), "Big <b>Sale</b>");
    }

    #[test]
    fn test_escaped_angle_bracket_stays_text() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::write_text(doc, index, "title", "1 < 2");
        });
        let mut overrides = OverrideMap::new();
        reconcile(&template, &snapshot, &Record::new(), &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "title"), Some(&FieldValue::from("1 < 2")));
    }

    #[test]
    fn test_bound_width_name_not_reconciled_as_width() {
        let template =
            Template::from_markup(r#"<p data-field="box">b</p><p data-field="box_width">w</p>"#).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::write_text(doc, index, "box_width", "300 mm");
        });
        let mut overrides = OverrideMap::new();
        reconcile(&template, &snapshot, &Record::new(), &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "box_width"), Some(&FieldValue::from("300 mm")));
        assert_eq!(overrides.for_record(RecordId(1)).map(|o| o.keys().count()), Some(1));
    }

    #[test]
    fn test_value_matching_record_removes_override() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::write_text(doc, index, "title", "Data");
        });
        let mut overrides = OverrideMap::new();
        overrides.set(RecordId(1), "title", "Stale".into());
        reconcile(&template, &snapshot, &Record::new().with("title", "Data"), &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "title"), None);
    }

    #[test]
    fn test_absolute_image_url_matches_relative_record() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            let img = index.first("pic").unwrap();
            doc.set_attr(img, "src", "https://host.test/img/b.png");
        });
        let mut overrides = OverrideMap::new();
        overrides.set(RecordId(1), "pic", "elsewhere.png".into());
        let record = Record::new().with("pic", "img/b.png");
        reconcile(&template, &snapshot, &record, &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "pic"), None);
    }

    #[test]
    fn test_price_decimal_compared_without_dot() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |_, _| {});
        let mut overrides = OverrideMap::new();
        let record = Record::new().with("p_int", "9").with("p_dec", ".99");
        let report = reconcile(&template, &snapshot, &record, &mut overrides);
        assert!(report.set.is_empty());
    }

    #[test]
    fn test_width_and_transform_reconciled() {
        let template = Template::from_markup(MARKUP).unwrap();
        let snapshot = snapshot_of(&template, |doc, index| {
            binding::apply_width(doc, index.first("title").unwrap(), 150.0);
            let t = ElementTransform {
                x: 5.0,
                y: 6.0,
                scale: 1.5,
            };
            binding::apply_transform(doc, index.first("pic").unwrap(), &t);
        });
        let mut overrides = OverrideMap::new();
        reconcile(&template, &snapshot, &Record::new(), &mut overrides);
        assert_eq!(overrides.get(RecordId(1), "title_width"), Some(&FieldValue::from("150")));
        assert_eq!(
            overrides.get(RecordId(1), "pic_transform_0"),
            Some(&FieldValue::Transform(ElementTransform {
                x: 5.0,
                y: 6.0,
                scale: 1.5
            }))
        );

        let plain = snapshot_of(&template, |_, _| {});
        reconcile(&template, &plain, &Record::new(), &mut overrides);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_repeated_images_reconciled_as_list() {
        let template = Template::from_markup(MARKUP).unwrap();
        let record = Record::new().with("pic", vec!["a.png".to_string()]).with("pic_qty", "2");
        let config = crate::config::EngineConfig::default();

        let mut doc = template.instantiate();
        let mut index = FieldIndex::build(&doc);
        crate::merge::apply_record(&mut doc, &mut index, &record, RecordId(1), &OverrideMap::new(), &config);
        let snapshot = capture(&doc, &index, &SnapshotMeta::default(), &BackgroundState::default());

        let mut overrides = OverrideMap::new();
        overrides.set(RecordId(1), "pic", vec!["z.png".to_string()].into());
        let report =
            reconcile_overrides(&doc, &index, &snapshot, &record, &template, RecordId(1), &mut overrides);
        assert_eq!(report.removed, vec!["pic".to_string()]);
    }
}
