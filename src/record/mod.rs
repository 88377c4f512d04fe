//! # Records and Datasets
//!
//! A [`Record`] is one flat key → value mapping (one banner). A [`Dataset`]
//! holds the loaded records; `RecordId(0)` is always the bare record that
//! renders the template as-is.
//!
//! Values arrive as JSON and are coerced defensively: numbers and booleans
//! become strings, arrays become string lists, objects with `x`/`y` become
//! transforms, `{"html": ...}` objects become inner markup, and anything else
//! becomes an empty string.

pub mod overrides;

pub use overrides::{OverrideKey, OverrideMap, RecordOverrides};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::binding::ElementTransform;
use crate::error::BinderyError;

/// Stable identifier of a record within the loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl RecordId {
    /// The bare-template record.
    pub const BARE: RecordId = RecordId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// FIELD VALUES
// ============================================================================

/// One value of a record or override.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Repeatable image sources.
    List(Vec<String>),
    Transform(ElementTransform),
    /// Inner markup of a text field, kept when a restore brings back
    /// formatted content.
    Markup(String),
}

const MARKUP_KEY: &str = "html";

impl FieldValue {
    /// Coerce any JSON value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Null => Self::Text(String::new()),
            Value::Array(items) => Self::List(items.iter().map(json_scalar_string).collect()),
            Value::Object(map) if map.len() == 1 && map.contains_key(MARKUP_KEY) => {
                Self::Markup(map.get(MARKUP_KEY).map(json_scalar_string).unwrap_or_default())
            }
            Value::Object(map) => {
                match serde_json::from_value::<ElementTransform>(Value::Object(map.clone())) {
                    Ok(t) => Self::Transform(t),
                    Err(_) => Self::Text(value.to_string()),
                }
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
            Self::Transform(t) => serde_json::json!({"x": t.x, "y": t.y, "scale": t.scale}),
            Self::Markup(html) => serde_json::json!({ MARKUP_KEY: html }),
        }
    }

    /// Scalar view: text or markup as-is, the first list item, or the
    /// transform CSS.
    pub fn as_scalar(&self) -> String {
        match self {
            Self::Text(s) | Self::Markup(s) => s.clone(),
            Self::List(items) => items.first().cloned().unwrap_or_default(),
            Self::Transform(t) => t.to_css(),
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Transform view: the transform itself, or text in `"x,y[,scale]"` or
    /// CSS form.
    pub fn as_transform(&self) -> Option<ElementTransform> {
        match self {
            Self::Transform(t) => Some(*t),
            Self::Text(s) => parse_transform_text(s),
            Self::List(_) | Self::Markup(_) => None,
        }
    }

    /// Quantity view; anything that is not a non-negative integer is `None`.
    pub fn as_quantity(&self) -> Option<usize> {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<usize>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as usize))
            }
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<ElementTransform> for FieldValue {
    fn from(t: ElementTransform) -> Self {
        Self::Transform(t)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

fn json_scalar_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_transform_text(s: &str) -> Option<ElementTransform> {
    if let Some(t) = ElementTransform::from_css(s) {
        return Some(t);
    }
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y] => Some(ElementTransform {
            x: *x,
            y: *y,
            scale: 1.0,
        }),
        [x, y, scale] => Some(ElementTransform {
            x: *x,
            y: *y,
            scale: *scale,
        }),
        _ => None,
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One unit of data to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// The loaded records, with the bare record at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            records: vec![Record::new()],
        }
    }
}

impl Dataset {
    /// Data rows become records `1..=rows.len()`.
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let mut records = Vec::with_capacity(rows.len() + 1);
        records.push(Record::new());
        records.extend(rows);
        Self { records }
    }

    /// Parse a JSON array of row objects.
    pub fn from_json_str(json: &str) -> Result<Self, BinderyError> {
        let rows: Vec<Record> = serde_json::from_str(json)?;
        Ok(Self::from_rows(rows))
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.index())
    }

    pub fn contains(&self, id: RecordId) -> bool {
        id.index() < self.records.len()
    }

    /// Number of records including the bare record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when only the bare record exists.
    pub fn is_empty(&self) -> bool {
        self.records.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.records.len()).map(|i| RecordId(i as u32))
    }
}
