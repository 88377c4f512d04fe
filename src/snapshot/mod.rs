//! # Snapshots
//!
//! A [`Snapshot`] is a view-independent description of one record's rendered
//! field state. It is what the undo/redo history stores.
//!
//! ## JSON Shape
//!
//! ```json
//! {
//!   "meta": {"width": 300, "height": 250, "sizeMode": "preset"},
//!   "background": {"selected": "bg-2", "pos": "center", "size": "cover"},
//!   "elements": {
//!     "title": {
//!       "key": "title",
//!       "tag": "h1",
//!       "content": "Big <b>Sale</b>",
//!       "text": "Big Sale",
//!       "className": "headline",
//!       "style": {"fontSize": "24px", "transform": "translate(4px, 0px)"}
//!     }
//!   }
//! }
//! ```
//!
//! ## Submodules
//!
//! | Module | Operation |
//! |--------|-----------|
//! | [`capture`] | document → snapshot |
//! | [`restore`] | snapshot → document |
//! | [`reconcile`] | snapshot → override map |

pub mod capture;
pub mod reconcile;
pub mod restore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::binding::{FieldKey, PricePart};

pub use capture::{InlineStyles, StyleResolver, capture, capture_with};
pub use reconcile::{ReconcileReport, normalize_image_path, reconcile_overrides};
pub use restore::{RestoreReport, restore};

// ============================================================================
// STYLE WHITELIST
// ============================================================================

/// Style properties a snapshot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleProp {
    Position,
    Left,
    Top,
    Right,
    Bottom,
    Width,
    Height,
    Transform,
    TransformOrigin,
    FontFamily,
    FontSize,
    FontWeight,
    FontStyle,
    Color,
    LineHeight,
    LetterSpacing,
    TextAlign,
    Opacity,
    ZIndex,
    BackgroundImage,
    BackgroundSize,
    BackgroundPosition,
}

impl StyleProp {
    pub const ALL: [StyleProp; 22] = [
        StyleProp::Position,
        StyleProp::Left,
        StyleProp::Top,
        StyleProp::Right,
        StyleProp::Bottom,
        StyleProp::Width,
        StyleProp::Height,
        StyleProp::Transform,
        StyleProp::TransformOrigin,
        StyleProp::FontFamily,
        StyleProp::FontSize,
        StyleProp::FontWeight,
        StyleProp::FontStyle,
        StyleProp::Color,
        StyleProp::LineHeight,
        StyleProp::LetterSpacing,
        StyleProp::TextAlign,
        StyleProp::Opacity,
        StyleProp::ZIndex,
        StyleProp::BackgroundImage,
        StyleProp::BackgroundSize,
        StyleProp::BackgroundPosition,
    ];

    /// Property name as written in a `style` attribute.
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Left => "left",
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Width => "width",
            Self::Height => "height",
            Self::Transform => "transform",
            Self::TransformOrigin => "transform-origin",
            Self::FontFamily => "font-family",
            Self::FontSize => "font-size",
            Self::FontWeight => "font-weight",
            Self::FontStyle => "font-style",
            Self::Color => "color",
            Self::LineHeight => "line-height",
            Self::LetterSpacing => "letter-spacing",
            Self::TextAlign => "text-align",
            Self::Opacity => "opacity",
            Self::ZIndex => "z-index",
            Self::BackgroundImage => "background-image",
            Self::BackgroundSize => "background-size",
            Self::BackgroundPosition => "background-position",
        }
    }

    /// True when `value` is the property's initial value (or empty).
    pub fn is_default(self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return true;
        }
        match self {
            Self::Position => value == "static",
            Self::Left | Self::Top | Self::Right | Self::Bottom => value == "auto",
            Self::Width | Self::Height => value == "auto",
            Self::Transform => value == "none",
            Self::TransformOrigin => matches!(value, "50% 50%" | "50% 50% 0px"),
            Self::FontWeight => matches!(value, "normal" | "400"),
            Self::FontStyle | Self::LineHeight | Self::LetterSpacing => value == "normal",
            Self::TextAlign => value == "start",
            Self::Opacity => value == "1",
            Self::ZIndex => value == "auto",
            Self::BackgroundImage => value == "none",
            Self::BackgroundSize => matches!(value, "auto" | "auto auto"),
            Self::BackgroundPosition => matches!(value, "0% 0%" | "0px 0px"),
            Self::FontFamily | Self::FontSize | Self::Color => false,
        }
    }
}

// ============================================================================
// SNAPSHOT TYPES
// ============================================================================

/// Captured state of one bound field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub key: FieldKey,
    pub tag: String,
    /// Inner markup (or the part text of a price half).
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<PricePart>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<StyleProp, String>,
}

impl ElementSnapshot {
    pub fn is_image(&self) -> bool {
        self.image_src.is_some()
    }

    pub fn style_value(&self, prop: StyleProp) -> Option<&str> {
        self.style.get(&prop).map(String::as_str)
    }
}

/// Canvas size of the banner when the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotMeta {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub size_mode: Option<String>,
}

/// Background selection when the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundState {
    pub selected: Option<String>,
    pub pos: Option<String>,
    pub size: Option<String>,
}

/// One record's complete rendered field state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub meta: SnapshotMeta,
    #[serde(default)]
    pub background: BackgroundState,
    #[serde(default)]
    pub elements: BTreeMap<FieldKey, ElementSnapshot>,
}

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&ElementSnapshot> {
        self.elements.get(key)
    }

    pub fn to_json(&self) -> Result<String, crate::error::BinderyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, crate::error::BinderyError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_recognized() {
        assert!(StyleProp::Opacity.is_default("1"));
        assert!(StyleProp::Position.is_default("static"));
        assert!(StyleProp::Transform.is_default(" none "));
        assert!(StyleProp::Color.is_default(""));
        assert!(!StyleProp::Color.is_default("red"));
        assert!(!StyleProp::Opacity.is_default("0.5"));
    }

    #[test]
    fn test_css_names_unique() {
        let mut names: Vec<&str> = StyleProp::ALL.iter().map(|p| p.css_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), StyleProp::ALL.len());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "meta": {"width": 300, "height": 250, "sizeMode": "preset"},
            "background": {"selected": "bg-2"},
            "elements": {
                "title": {"key": "title", "tag": "h1", "content": "Hi", "text": "Hi",
                          "style": {"fontSize": "24px", "zIndex": "3"}}
            }
        }"#;
        let snap = Snapshot::from_json_str(json).unwrap();
        assert_eq!(snap.meta.width, Some(300.0));
        assert_eq!(snap.meta.size_mode.as_deref(), Some("preset"));
        assert_eq!(snap.background.selected.as_deref(), Some("bg-2"));
        let title = snap.get("title").unwrap();
        assert_eq!(title.style_value(StyleProp::FontSize), Some("24px"));
        assert_eq!(title.style_value(StyleProp::ZIndex), Some("3"));
        assert!(!title.is_image());

        let back = Snapshot::from_json_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(back, snap);
    }
}
