//! The Override Map: user edits layered on top of records.
//!
//! ## Key Grammar
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `title` | direct value of field `title` |
//! | `product_transform_2` | transform of the third `<img>` bound to `product` |
//! | `title_width` | explicit pixel width of field `title` |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{FieldValue, RecordId};
use crate::binding::FieldKey;

const TRANSFORM_INFIX: &str = "_transform_";
const WIDTH_SUFFIX: &str = "_width";

/// A parsed override key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverrideKey {
    Direct(FieldKey),
    Transform { field: FieldKey, index: usize },
    Width(FieldKey),
}

impl OverrideKey {
    pub fn parse(key: &str) -> Self {
        if let Some((field, idx)) = key.rsplit_once(TRANSFORM_INFIX)
            && !field.is_empty()
            && let Ok(index) = idx.parse::<usize>()
        {
            return Self::Transform {
                field: FieldKey::new(field),
                index,
            };
        }
        if let Some(field) = key.strip_suffix(WIDTH_SUFFIX)
            && !field.is_empty()
        {
            return Self::Width(FieldKey::new(field));
        }
        Self::Direct(FieldKey::new(key))
    }

    /// The field this key belongs to.
    pub fn field(&self) -> &FieldKey {
        match self {
            Self::Direct(f) | Self::Width(f) => f,
            Self::Transform { field, .. } => field,
        }
    }

    pub fn transform(field: &FieldKey, index: usize) -> String {
        Self::Transform {
            field: field.clone(),
            index,
        }
        .to_string()
    }

    pub fn width(field: &FieldKey) -> String {
        Self::Width(field.clone()).to_string()
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(field) => write!(f, "{}", field),
            Self::Transform { field, index } => write!(f, "{}{}{}", field, TRANSFORM_INFIX, index),
            Self::Width(field) => write!(f, "{}{}", field, WIDTH_SUFFIX),
        }
    }
}

/// Overrides of one record, keyed by raw override key.
pub type RecordOverrides = BTreeMap<String, FieldValue>;

/// `RecordId → (override key → value)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideMap {
    records: BTreeMap<RecordId, RecordOverrides>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides for `id` (empty when none were ever made).
    pub fn for_record(&self, id: RecordId) -> Option<&RecordOverrides> {
        self.records.get(&id)
    }

    pub fn get(&self, id: RecordId, key: &str) -> Option<&FieldValue> {
        self.records.get(&id)?.get(key)
    }

    /// Set an override, creating the record entry on first edit.
    pub fn set(&mut self, id: RecordId, key: impl Into<String>, value: FieldValue) {
        self.records.entry(id).or_default().insert(key.into(), value);
    }

    /// Remove one override. Empty record entries are dropped.
    pub fn remove(&mut self, id: RecordId, key: &str) -> Option<FieldValue> {
        let entry = self.records.get_mut(&id)?;
        let removed = entry.remove(key);
        if entry.is_empty() {
            self.records.remove(&id);
        }
        removed
    }

    /// Remove every override of `id` whose key satisfies `pred`.
    pub fn remove_where(&mut self, id: RecordId, mut pred: impl FnMut(&str) -> bool) {
        if let Some(entry) = self.records.get_mut(&id) {
            entry.retain(|k, _| !pred(k));
            if entry.is_empty() {
                self.records.remove(&id);
            }
        }
    }

    /// Drop every override (template replaced).
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
