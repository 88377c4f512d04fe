//! # Templates
//!
//! The ingestion pipeline (ZIP unpacking, asset inlining, field discovery)
//! lives upstream. It hands over a [`TemplateSource`]:
//!
//! ```json
//! {
//!   "documentMarkup": "<div class=\"banner\"><h1 data-field=\"title\">Sale</h1></div>",
//!   "styleText": ".banner { width: 300px }",
//!   "fields": [{"key": "title", "label": "Title"}]
//! }
//! ```
//!
//! A [`Template`] is immutable once built. Every Document View gets its own
//! fresh instance through [`Template::instantiate`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::binding::{self, FieldIndex, FieldKey};
use crate::dom::Document;
use crate::error::BinderyError;
use crate::record::OverrideKey;

/// A field as announced by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: FieldKey,
    #[serde(default)]
    pub label: Option<String>,
}

/// What the ingestion pipeline produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSource {
    pub document_markup: String,
    #[serde(default)]
    pub style_text: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl TemplateSource {
    pub fn from_json_str(json: &str) -> Result<Self, BinderyError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, BinderyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// A parsed, validated template.
#[derive(Debug, Clone)]
pub struct Template {
    source: TemplateSource,
    pristine: Document,
    fields: Vec<FieldSpec>,
    bound: BTreeSet<FieldKey>,
    defaults: BTreeMap<FieldKey, String>,
    default_widths: BTreeMap<FieldKey, f64>,
}

impl Template {
    /// Parse the markup once and record each field's baked-in value.
    ///
    /// Fields bound in the markup but missing from `source.fields` are
    /// appended (labelled by key); announced fields with no element are kept
    /// so the editor can still list them.
    pub fn new(source: TemplateSource) -> Result<Self, BinderyError> {
        let pristine = Document::parse(&source.document_markup)?;
        let index = FieldIndex::build(&pristine);

        let mut fields = source.fields.clone();
        for key in index.keys() {
            if !fields.iter().any(|f| &f.key == key) {
                fields.push(FieldSpec {
                    key: key.clone(),
                    label: None,
                });
            }
        }

        let defaults = index
            .keys()
            .filter_map(|key| {
                binding::read_field(&pristine, &index, key.as_str()).map(|v| (key.clone(), v))
            })
            .collect();

        let default_widths = index
            .keys()
            .filter_map(|key| {
                let node = index.first(key.as_str())?;
                let width = pristine.style_property(node, "width")?;
                binding::parse_px(&width).map(|w| (key.clone(), w))
            })
            .collect();

        tracing::info!(fields = fields.len(), bound = index.len(), "template parsed");
        Ok(Self {
            source,
            pristine,
            fields,
            bound: index.keys().cloned().collect(),
            defaults,
            default_widths,
        })
    }

    /// Shorthand for a markup-only template.
    pub fn from_markup(markup: &str) -> Result<Self, BinderyError> {
        Self::new(TemplateSource {
            document_markup: markup.to_string(),
            style_text: String::new(),
            fields: Vec::new(),
        })
    }

    /// A fresh, independent document for one view.
    pub fn instantiate(&self) -> Document {
        self.pristine.clone()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Keys bound somewhere in the markup.
    pub fn bound_keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.bound.iter()
    }

    /// Classify `key` against this template's bindings; see
    /// [`FieldIndex::override_key`].
    pub fn override_key(&self, key: &str) -> OverrideKey {
        if self.bound.contains(key) {
            OverrideKey::Direct(FieldKey::new(key))
        } else {
            OverrideKey::parse(key)
        }
    }

    /// The value the template itself shows for `key`.
    pub fn default_value(&self, key: &str) -> Option<&str> {
        self.defaults.get(key).map(String::as_str)
    }

    /// Inline pixel width the template gives `key`, if any.
    pub fn default_width(&self, key: &str) -> Option<f64> {
        self.default_widths.get(key).copied()
    }

    pub fn style_text(&self) -> &str {
        &self.source.style_text
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"{
        "documentMarkup": "<h1 data-field=\"title\">Sale</h1><img data-field=\"pic\" src=\"/assets/a.png\"><div data-price-int=\"p_int\" data-price-dec=\"p_dec\"><span class=\"price-int-2d\">9</span><span class=\"price-dec-2d\">.99</span></div>",
        "styleText": "h1 { color: red }",
        "fields": [{"key": "title", "label": "Title"}, {"key": "ghost"}]
    }"#;

    #[test]
    fn test_defaults_recorded() {
        let t = Template::new(TemplateSource::from_json_str(SOURCE).unwrap()).unwrap();
        assert_eq!(t.default_value("title"), Some("Sale"));
        assert_eq!(t.default_value("pic"), Some("/assets/a.png"));
        assert_eq!(t.default_value("p_int"), Some("9"));
        assert_eq!(t.default_value("p_dec"), Some("99"));
        assert_eq!(t.default_value("ghost"), None);
        assert_eq!(t.style_text(), "h1 { color: red }");
    }

    #[test]
    fn test_fields_merged_with_discovered() {
        let t = Template::new(TemplateSource::from_json_str(SOURCE).unwrap()).unwrap();
        let keys: Vec<&str> = t.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["title", "ghost", "p_dec", "p_int", "pic"]);
        assert_eq!(t.fields()[0].label.as_deref(), Some("Title"));
    }

    #[test]
    fn test_default_width() {
        let t = Template::from_markup(r#"<p data-field="a" style="width: 120px">x</p><p data-field="b">y</p>"#)
            .unwrap();
        assert_eq!(t.default_width("a"), Some(120.0));
        assert_eq!(t.default_width("b"), None);
    }

    #[test]
    fn test_instances_are_independent() {
        let t = Template::from_markup(r#"<p data-field="a">x</p>"#).unwrap();
        let mut one = t.instantiate();
        let two = t.instantiate();
        let p = one.elements_with_attr("data-field")[0];
        one.set_text_content(p, "changed");
        assert_eq!(two.inner_html(two.root()), r#"<p data-field="a">x</p>"#);
    }

    #[test]
    fn test_override_key_prefers_bound_names() {
        let t = Template::from_markup(
            r#"<span data-field="box_width">w</span><img data-field="pic_transform_0" src="a.png"><p data-field="title">t</p>"#,
        )
        .unwrap();
        assert_eq!(t.override_key("box_width"), OverrideKey::Direct(FieldKey::new("box_width")));
        assert_eq!(
            t.override_key("pic_transform_0"),
            OverrideKey::Direct(FieldKey::new("pic_transform_0"))
        );
        assert_eq!(t.override_key("title_width"), OverrideKey::Width(FieldKey::new("title")));
    }
}
