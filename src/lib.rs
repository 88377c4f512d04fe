//! # Bindery - Template Data-Binding Engine
//!
//! Bindery drives a batch banner editor: one HTML template, many data
//! records, and per-record manual tweaks. It provides:
//!
//! - **Binding**: locating `data-field` elements and price pairs
//! - **Merging**: rendering template ⊕ record ⊕ overrides into a document
//! - **Snapshots**: capturing and restoring the visual state of bound fields
//! - **History**: per-record linear undo/redo with override reconciliation
//! - **Sync**: keeping preview, export and grid views consistent
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Duration;
//! use bindery::{
//!     EngineConfig, SyncController, ViewRole,
//!     record::{Dataset, Record},
//!     template::TemplateSource,
//! };
//!
//! let mut engine = SyncController::new(EngineConfig::default())?;
//! engine.set_dataset(Dataset::from_rows(vec![
//!     Record::new().with("title", "Spring sale"),
//! ]));
//! engine.load_template(TemplateSource {
//!     document_markup: r#"<h1 data-field="title">Title</h1>"#.into(),
//!     style_text: String::new(),
//!     fields: Vec::new(),
//! })?;
//! engine.view_loaded(ViewRole::Preview)?;
//! engine.view_loaded(ViewRole::Export)?;
//! engine.advance(Duration::from_millis(50));
//!
//! engine.edit_field("title", "Summer sale".into())?;
//! engine.advance(Duration::from_millis(400));
//! engine.undo()?;
//! assert_eq!(
//!     engine.field_value(ViewRole::Preview, "title").as_deref(),
//!     Some("Spring sale"),
//! );
//! # Ok::<(), bindery::BinderyError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dom`] | Arena document tree, HTML fragment parser and serializer |
//! | [`binding`] | Field discovery and field-level read/write primitives |
//! | [`record`] | Records, datasets and the per-record override map |
//! | [`template`] | Parsed templates and their baked-in defaults |
//! | [`merge`] | Applying a record to a document |
//! | [`snapshot`] | Capture, restore and override reconciliation |
//! | [`history`] | Per-record undo/redo stacks |
//! | [`schedule`] | Virtual-clock task queue |
//! | [`sync`] | The multi-view session controller |
//! | [`config`] | Engine timings and limits |
//! | [`error`] | Error types |

pub mod binding;
pub mod config;
pub mod dom;
pub mod error;
pub mod history;
pub mod merge;
pub mod record;
pub mod schedule;
pub mod snapshot;
pub mod sync;
pub mod template;

// Re-exports for convenience
pub use config::EngineConfig;
pub use error::BinderyError;
pub use record::{Dataset, FieldValue, OverrideMap, Record, RecordId};
pub use snapshot::Snapshot;
pub use sync::{ControllerState, DisplayMode, Rasterizer, SyncController, ViewRole};
pub use template::{Template, TemplateSource};
