//! # Multi-View Synchronization Controller
//!
//! [`SyncController`] owns the editing session: template, dataset, override
//! map, per-record histories and every live [`View`]. It decides which record
//! is active, fans edits out to every view showing that record, and gates
//! snapshot capture.
//!
//! ## Views
//!
//! | Role | Shows |
//! |------|-------|
//! | `Preview` | the selected record |
//! | `Export` | the active record |
//! | `Grid(i)` | record `1 + page × cells + i` (grid mode only) |
//!
//! ## States
//!
//! ```text
//!             load_template                 view_loaded
//!   ───────────────► Loading ───────────────────────► Ready
//!                                                    │    ▲
//!                                  undo/redo/reset   │    │ restore_grace
//!                                                    ▼    │
//!                                                  Restoring
//! ```
//!
//! Captures only run in `Ready`; one that falls due while another record is
//! restoring waits another debounce. Edits made while `Restoring` land in the
//! override map and are merged once the restore settles. A navigation that
//! takes a record out of every view commits its pending capture first.
//!
//! ## Time
//!
//! Nothing here sleeps. Delayed work is queued on a [`Scheduler`] and runs
//! when the host calls [`SyncController::advance`].

pub mod view;

pub use view::{DisplayMode, View, ViewRole};

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::{self, FieldIndex, FieldKey};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeId};
use crate::error::BinderyError;
use crate::history::{History, HistoryStore};
use crate::merge::apply_record;
use crate::record::{Dataset, FieldValue, OverrideMap, RecordId};
use crate::schedule::Scheduler;
use crate::snapshot::{
    self, BackgroundState, InlineStyles, StyleResolver, Snapshot, SnapshotMeta, capture_with,
};
use crate::template::{Template, TemplateSource};

const PREVIEW_SLOT: usize = 0;
const EXPORT_SLOT: usize = 1;
const GRID_OFFSET: usize = 2;

/// Capture gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No view has finished loading the current template.
    Loading,
    /// Captures may run.
    Ready,
    /// A restore is being applied; captures are blocked.
    Restoring,
}

/// Downstream raster export.
pub trait Rasterizer {
    type Output;

    /// Render `target` of a fully merged, settled document.
    fn rasterize(&mut self, doc: &Document, target: NodeId) -> Result<Self::Output, BinderyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskKey {
    Capture(RecordId),
}

#[derive(Debug, Clone)]
enum Task {
    Capture(RecordId),
    InitialSnapshot(RecordId),
    RestoreRetry {
        record: RecordId,
        roles: Vec<ViewRole>,
        snapshot: Box<Snapshot>,
        reconciled: bool,
    },
    RestoreSettled(RecordId),
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Undo,
    Redo,
    Reset,
}

/// The editing session.
pub struct SyncController {
    config: EngineConfig,
    template: Option<Template>,
    dataset: Dataset,
    overrides: OverrideMap,
    histories: HistoryStore,
    views: Vec<View>,
    mode: DisplayMode,
    selected: RecordId,
    grid_page: usize,
    clicked_cell: Option<usize>,
    state: ControllerState,
    restoring: Option<RecordId>,
    scheduler: Scheduler<TaskKey, Task>,
    meta: SnapshotMeta,
    background: BackgroundState,
    /// Records whose initial snapshot is committed.
    initialized: BTreeSet<RecordId>,
    initial_pending: BTreeSet<RecordId>,
    parked_edits: BTreeSet<RecordId>,
    resolver: Box<dyn StyleResolver>,
}

impl SyncController {
    pub fn new(config: EngineConfig) -> Result<Self, BinderyError> {
        config.validate()?;
        let mut views = vec![View::new(ViewRole::Preview), View::new(ViewRole::Export)];
        views.extend((0..config.grid_cells).map(|i| View::new(ViewRole::Grid(i))));
        Ok(Self {
            scheduler: Scheduler::new(config.settle_delay()),
            histories: HistoryStore::new(config.max_history),
            config,
            template: None,
            dataset: Dataset::default(),
            overrides: OverrideMap::new(),
            views,
            mode: DisplayMode::Single,
            selected: RecordId::BARE,
            grid_page: 0,
            clicked_cell: None,
            state: ControllerState::Loading,
            restoring: None,
            meta: SnapshotMeta::default(),
            background: BackgroundState::default(),
            initialized: BTreeSet::new(),
            initial_pending: BTreeSet::new(),
            parked_edits: BTreeSet::new(),
            resolver: Box::new(InlineStyles),
        })
    }

    /// Use `resolver` for computed style values during capture.
    pub fn with_resolver(mut self, resolver: Box<dyn StyleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn selected(&self) -> RecordId {
        self.selected
    }

    pub fn grid_page(&self) -> usize {
        self.grid_page
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    /// History of `id`, if the record was ever activated.
    pub fn history(&self, id: RecordId) -> Option<&History> {
        self.histories.peek(id)
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn background(&self) -> &BackgroundState {
        &self.background
    }

    pub fn view(&self, role: ViewRole) -> Option<&View> {
        self.slot(role).map(|i| &self.views[i])
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Current value of `key` as `role` displays it.
    pub fn field_value(&self, role: ViewRole, key: &str) -> Option<String> {
        let view = self.view(role)?;
        binding::read_field(view.document()?, view.index(), key)
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    fn slot(&self, role: ViewRole) -> Option<usize> {
        match role {
            ViewRole::Preview => Some(PREVIEW_SLOT),
            ViewRole::Export => Some(EXPORT_SLOT),
            ViewRole::Grid(cell) if cell < self.config.grid_cells => Some(GRID_OFFSET + cell),
            ViewRole::Grid(_) => None,
        }
    }

    // ========================================================================
    // ACTIVE RECORD
    // ========================================================================

    /// Record shown by grid cell `cell` on the current page.
    pub fn grid_record(&self, cell: usize) -> Option<RecordId> {
        if self.mode != DisplayMode::Grid || cell >= self.config.grid_cells {
            return None;
        }
        if self.dataset.is_empty() {
            return (cell == 0).then_some(RecordId::BARE);
        }
        let id = RecordId((1 + self.grid_page * self.config.grid_cells + cell) as u32);
        self.dataset.contains(id).then_some(id)
    }

    fn grid_records(&self) -> impl Iterator<Item = RecordId> + '_ {
        (0..self.config.grid_cells).filter_map(|cell| self.grid_record(cell))
    }

    /// The record edits and history operations apply to.
    ///
    /// Single mode: the selected record. Grid mode: the clicked cell's record,
    /// else the selected record if it is on the page, else the first cell.
    pub fn active_record(&self) -> Option<RecordId> {
        match self.mode {
            DisplayMode::Single => Some(self.selected).filter(|id| self.dataset.contains(*id)),
            DisplayMode::Grid => self
                .clicked_cell
                .and_then(|cell| self.grid_record(cell))
                .or_else(|| self.grid_records().find(|id| *id == self.selected))
                .or_else(|| self.grid_record(0)),
        }
    }

    /// The view the user is editing in.
    pub fn focus_role(&self) -> Option<ViewRole> {
        match self.mode {
            DisplayMode::Single => Some(ViewRole::Preview),
            DisplayMode::Grid => {
                let active = self.active_record()?;
                (0..self.config.grid_cells)
                    .find(|cell| self.grid_record(*cell) == Some(active))
                    .map(ViewRole::Grid)
            }
        }
    }

    fn desired_showing(&self, role: ViewRole) -> Option<RecordId> {
        match role {
            ViewRole::Preview => Some(self.selected),
            ViewRole::Export => self.active_record(),
            ViewRole::Grid(cell) => self.grid_record(cell),
        }
    }

    fn page_of(&self, id: RecordId) -> usize {
        id.index().saturating_sub(1) / self.config.grid_cells
    }

    pub fn page_count(&self) -> usize {
        let rows = self.dataset.len().saturating_sub(1);
        rows.div_ceil(self.config.grid_cells).max(1)
    }

    // ========================================================================
    // SESSION SETUP
    // ========================================================================

    /// Replace the template. Every view starts swapping to a fresh instance;
    /// overrides and histories are dropped.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn load_template(&mut self, source: TemplateSource) -> Result<(), BinderyError> {
        let template = Template::new(source)?;
        self.overrides.clear();
        self.reset_session();
        self.state = ControllerState::Loading;

        for i in 0..self.views.len() {
            let desired = self.desired_showing(self.views[i].role);
            let view = &mut self.views[i];
            view.showing = desired;
            if desired.is_some() {
                view.pending = Some(template.instantiate());
            } else {
                view.pending = None;
                view.detach();
            }
        }
        tracing::info!(fields = template.fields().len(), "template replaced, waiting for views");
        self.template = Some(template);
        Ok(())
    }

    /// Replace the dataset. Overrides and histories belong to the old
    /// records and are dropped.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        tracing::info!(records = dataset.len() - 1, "dataset loaded");
        self.dataset = dataset;
        self.overrides.clear();
        self.reset_session();
        if self.state == ControllerState::Restoring {
            self.state = ControllerState::Ready;
        }
        self.selected = if self.dataset.is_empty() {
            RecordId::BARE
        } else {
            RecordId(1)
        };
        self.grid_page = 0;
        self.clicked_cell = None;
        for view in &mut self.views {
            view.showing = None;
        }
        self.refresh_views();
    }

    fn reset_session(&mut self) {
        self.histories.clear_all();
        self.scheduler.clear();
        self.initialized.clear();
        self.initial_pending.clear();
        self.parked_edits.clear();
        self.restoring = None;
    }

    /// A view finished loading its pending document.
    pub fn view_loaded(&mut self, role: ViewRole) -> Result<(), BinderyError> {
        let slot = self.slot(role).ok_or(BinderyError::ViewUnavailable(role))?;
        let Some(mut doc) = self.views[slot].pending.take() else {
            tracing::debug!(%role, "load event without a pending document");
            return Ok(());
        };
        let mut index = FieldIndex::build(&doc);
        if let Some(id) = self.views[slot].showing
            && let Some(record) = self.dataset.get(id)
        {
            apply_record(&mut doc, &mut index, record, id, &self.overrides, &self.config);
        }
        self.views[slot].attach(doc, index);

        if self.state == ControllerState::Loading {
            self.state = ControllerState::Ready;
            tracing::info!(%role, "template ready");
        }
        if let Some(id) = self.active_record() {
            self.activate(id);
        }
        Ok(())
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn select_record(&mut self, id: RecordId) -> Result<(), BinderyError> {
        if !self.dataset.contains(id) {
            return Err(BinderyError::UnknownRecord(id));
        }
        self.selected = id;
        if self.mode == DisplayMode::Grid {
            self.grid_page = self.page_of(id);
            self.clicked_cell = None;
        }
        self.refresh_views();
        Ok(())
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.clicked_cell = None;
        if mode == DisplayMode::Grid {
            self.grid_page = self.page_of(self.selected);
        }
        tracing::debug!(?mode, "display mode changed");
        self.refresh_views();
    }

    /// Show grid page `page` (clamped). Returns the page shown.
    pub fn set_grid_page(&mut self, page: usize) -> usize {
        self.grid_page = page.min(self.page_count() - 1);
        self.clicked_cell = None;
        self.refresh_views();
        self.grid_page
    }

    /// Make grid cell `cell` the active one.
    pub fn click_cell(&mut self, cell: usize) -> Result<RecordId, BinderyError> {
        let id = self
            .grid_record(cell)
            .ok_or(BinderyError::ViewUnavailable(ViewRole::Grid(cell)))?;
        self.clicked_cell = Some(cell);
        self.refresh_views();
        Ok(id)
    }

    /// Bring every view in line with the record it should show. A view whose
    /// record changes gets a fresh template instance right away.
    fn refresh_views(&mut self) {
        // A record leaving every view can no longer be captured, so its
        // pending edit capture is committed first.
        let desired: Vec<Option<RecordId>> =
            self.views.iter().map(|v| self.desired_showing(v.role)).collect();
        let outgoing: Vec<RecordId> = self
            .views
            .iter()
            .filter_map(|v| v.showing)
            .filter(|id| !desired.contains(&Some(*id)))
            .collect();
        for id in outgoing {
            self.flush_capture(id);
        }
        for slot in 0..self.views.len() {
            let desired = self.desired_showing(self.views[slot].role);
            if self.views[slot].showing != desired {
                self.show(slot, desired);
            }
        }
        if let Some(id) = self.active_record() {
            self.activate(id);
        }
    }

    fn show(&mut self, slot: usize, record: Option<RecordId>) {
        let view = &mut self.views[slot];
        view.showing = record;
        if view.is_loading() {
            return;
        }
        match (self.template.as_ref(), record) {
            (Some(template), Some(id)) => {
                let mut doc = template.instantiate();
                let mut index = FieldIndex::build(&doc);
                if let Some(rec) = self.dataset.get(id) {
                    apply_record(&mut doc, &mut index, rec, id, &self.overrides, &self.config);
                }
                view.attach(doc, index);
            }
            _ => view.detach(),
        }
    }

    fn activate(&mut self, id: RecordId) {
        if self.template.is_none() {
            return;
        }
        self.histories.get(id);
        if self.initialized.contains(&id) || !self.initial_pending.insert(id) {
            return;
        }
        tracing::debug!(record = %id, "initial snapshot scheduled");
        self.scheduler.schedule_after_settle(Task::InitialSnapshot(id));
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    /// Set override `key` of the active record and show it in every view of
    /// that record.
    pub fn edit_field(&mut self, key: &str, value: FieldValue) -> Result<(), BinderyError> {
        if self.template.is_none() {
            return Err(BinderyError::NoTemplate);
        }
        let id = self.active_record().ok_or(BinderyError::NoActiveRecord)?;

        if self.state == ControllerState::Restoring {
            self.overrides.set(id, key, value);
            self.parked_edits.insert(id);
            tracing::debug!(key, record = %id, "edit parked until restore settles");
            return Ok(());
        }

        // The pristine state must be in history before the first change.
        self.try_initial_snapshot(id);
        self.overrides.set(id, key, value);
        self.merge_views(id);
        if let Some(template) = self.template.as_ref() {
            let field = template.override_key(key).field().clone();
            self.highlight(&field);
        }
        self.schedule_capture(id);
        Ok(())
    }

    /// Update the canvas size of the active record's state.
    pub fn set_meta(&mut self, meta: SnapshotMeta) {
        self.meta = meta;
        if let Some(id) = self.active_record() {
            self.schedule_capture(id);
        }
    }

    /// Update the background selection of the active record's state.
    pub fn set_background(&mut self, background: BackgroundState) {
        self.background = background;
        if let Some(id) = self.active_record() {
            self.schedule_capture(id);
        }
    }

    fn schedule_capture(&mut self, id: RecordId) {
        self.scheduler.debounce(
            TaskKey::Capture(id),
            Task::Capture(id),
            self.config.capture_debounce(),
        );
    }

    fn merge_views(&mut self, id: RecordId) {
        let Some(record) = self.dataset.get(id) else {
            return;
        };
        for view in self.views.iter_mut().filter(|v| v.showing == Some(id)) {
            if let Some((doc, index)) = view.parts_mut() {
                apply_record(doc, index, record, id, &self.overrides, &self.config);
            }
        }
    }

    /// Highlight `field` on the focus view only.
    fn highlight(&mut self, field: &FieldKey) {
        let focus = self.focus_role();
        for view in &mut self.views {
            let role = view.role;
            if let Some((doc, index)) = view.parts_mut() {
                binding::clear_highlights(doc, index);
                if Some(role) == focus {
                    binding::set_highlight(doc, index, field.as_str(), true);
                }
            }
        }
    }

    // ========================================================================
    // CAPTURE
    // ========================================================================

    /// Snapshot of `id` from the focus view, else any ready view showing it.
    fn capture_record(&self, id: RecordId) -> Option<Snapshot> {
        let focus = self.focus_role();
        let view = self
            .views
            .iter()
            .filter(|v| v.showing == Some(id) && v.is_ready())
            .min_by_key(|v| Some(v.role) != focus)?;
        let doc = view.document()?;
        Some(capture_with(
            doc,
            view.index(),
            &self.meta,
            &self.background,
            self.resolver.as_ref(),
        ))
    }

    /// Commit the pending capture of `id` now, if one is waiting and `id` is
    /// not being restored.
    fn flush_capture(&mut self, id: RecordId) {
        let allowed = match self.state {
            ControllerState::Ready => true,
            ControllerState::Restoring => self.restoring != Some(id),
            ControllerState::Loading => false,
        };
        if allowed && self.scheduler.cancel(&TaskKey::Capture(id)) {
            self.commit_capture(id);
        }
    }

    fn commit_capture(&mut self, id: RecordId) {
        match self.capture_record(id) {
            Some(snapshot) => {
                let history = self.histories.get(id);
                if history.current() == Some(&snapshot) {
                    tracing::debug!(record = %id, "capture matches current entry, not pushed");
                } else {
                    history.push(snapshot);
                    tracing::debug!(record = %id, "snapshot pushed");
                }
            }
            None => tracing::debug!(record = %id, "no ready view, capture dropped"),
        }
    }

    /// Commit the initial snapshot of `id` if its focus view is ready and
    /// carries every bound field. Returns whether one exists now.
    fn try_initial_snapshot(&mut self, id: RecordId) -> bool {
        if self.initialized.contains(&id) {
            return true;
        }
        if self.state != ControllerState::Ready {
            return false;
        }
        let Some(template) = self.template.as_ref() else {
            return false;
        };
        let Some(view) = self.focus_role().and_then(|role| self.view(role)) else {
            return false;
        };
        if view.showing != Some(id)
            || !view.is_ready()
            || !view.index().has_all(template.bound_keys())
        {
            return false;
        }
        let Some(snapshot) = self.capture_record(id) else {
            return false;
        };
        self.histories.get(id).push(snapshot);
        self.initialized.insert(id);
        self.initial_pending.remove(&id);
        tracing::info!(record = %id, "initial snapshot committed");
        true
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Step the active record back one snapshot. Returns whether a restore
    /// started.
    pub fn undo(&mut self) -> Result<bool, BinderyError> {
        self.step(Step::Undo)
    }

    pub fn redo(&mut self) -> Result<bool, BinderyError> {
        self.step(Step::Redo)
    }

    /// Jump the active record back to its first snapshot.
    pub fn reset_history(&mut self) -> Result<bool, BinderyError> {
        self.step(Step::Reset)
    }

    fn step(&mut self, step: Step) -> Result<bool, BinderyError> {
        if self.template.is_none() {
            return Err(BinderyError::NoTemplate);
        }
        let id = self.active_record().ok_or(BinderyError::NoActiveRecord)?;
        if self.state == ControllerState::Loading {
            tracing::debug!(?step, "template still loading, history step ignored");
            return Ok(false);
        }
        // An edit still waiting for its debounce is committed first so the
        // step starts from what the user sees.
        self.flush_capture(id);

        let history = self.histories.get(id);
        let snapshot = match step {
            Step::Undo => history.undo(),
            Step::Redo => history.redo(),
            Step::Reset => history.reset(),
        }
        .cloned();
        let Some(snapshot) = snapshot else {
            return Ok(false);
        };
        tracing::info!(record = %id, ?step, cursor = ?history.cursor(), "history moved");
        self.begin_restore(id, snapshot);
        Ok(true)
    }

    fn begin_restore(&mut self, id: RecordId, snapshot: Snapshot) {
        self.state = ControllerState::Restoring;
        self.restoring = Some(id);
        self.scheduler.cancel(&TaskKey::Capture(id));
        self.scheduler
            .cancel_where(|t| matches!(t, Task::RestoreSettled(_) | Task::RestoreRetry { .. }));
        self.meta = snapshot.meta.clone();
        self.background = snapshot.background.clone();

        let mut waiting = Vec::new();
        for view in self.views.iter_mut().filter(|v| v.showing == Some(id)) {
            let role = view.role;
            match view.parts_mut() {
                Some((doc, index)) => {
                    snapshot::restore(doc, index, &snapshot);
                    binding::clear_highlights(doc, index);
                }
                None => waiting.push(role),
            }
        }
        let reconciled = self.reconcile(id, &snapshot);

        if !waiting.is_empty() {
            tracing::debug!(record = %id, ?waiting, "views not ready, restore retry scheduled");
            self.scheduler.schedule_after(
                Task::RestoreRetry {
                    record: id,
                    roles: waiting,
                    snapshot: Box::new(snapshot),
                    reconciled,
                },
                self.config.restore_retry(),
            );
        }
        self.scheduler
            .schedule_after(Task::RestoreSettled(id), self.config.restore_grace());
    }

    /// Reconcile overrides from a ready view showing `id`.
    fn reconcile(&mut self, id: RecordId, snapshot: &Snapshot) -> bool {
        let focus = self.focus_role();
        let (Some(template), Some(record)) = (self.template.as_ref(), self.dataset.get(id)) else {
            return false;
        };
        let Some(view) = self
            .views
            .iter()
            .filter(|v| v.showing == Some(id) && v.is_ready())
            .min_by_key(|v| Some(v.role) != focus)
        else {
            return false;
        };
        let Some(doc) = view.document() else {
            return false;
        };
        snapshot::reconcile_overrides(
            doc,
            view.index(),
            snapshot,
            record,
            template,
            id,
            &mut self.overrides,
        );
        true
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Merge the active record into the export view and strip highlights.
    pub fn prepare_export(&mut self) -> Result<&Document, BinderyError> {
        if self.template.is_none() {
            return Err(BinderyError::NoTemplate);
        }
        let id = self.active_record().ok_or(BinderyError::NoActiveRecord)?;
        let record = self.dataset.get(id).ok_or(BinderyError::UnknownRecord(id))?;
        let view = &mut self.views[EXPORT_SLOT];
        if view.showing != Some(id) {
            return Err(BinderyError::ViewUnavailable(ViewRole::Export));
        }
        let (doc, index) = view
            .parts_mut()
            .ok_or(BinderyError::ViewUnavailable(ViewRole::Export))?;
        apply_record(doc, index, record, id, &self.overrides, &self.config);
        binding::clear_highlights(doc, index);
        Ok(doc)
    }

    /// Hand the prepared export view to `rasterizer`.
    pub fn export<R: Rasterizer>(&mut self, rasterizer: &mut R) -> Result<R::Output, BinderyError> {
        let doc = self.prepare_export()?;
        rasterizer.rasterize(doc, doc.root())
    }

    // ========================================================================
    // TIME
    // ========================================================================

    /// Move the virtual clock forward by `by`, running every task that falls
    /// due on the way.
    pub fn advance(&mut self, by: Duration) {
        let target = self.scheduler.now() + by;
        while let Some(task) = self.scheduler.pop_due(target) {
            self.run(task);
        }
        self.scheduler.advance_to(target);
    }

    fn run(&mut self, task: Task) {
        match task {
            Task::Capture(id) => match self.state {
                ControllerState::Ready => self.commit_capture(id),
                ControllerState::Restoring if self.restoring != Some(id) => {
                    tracing::debug!(record = %id, "another record is restoring, capture deferred");
                    self.schedule_capture(id);
                }
                state => tracing::debug!(record = %id, ?state, "capture dropped"),
            },
            Task::InitialSnapshot(id) => {
                self.initial_pending.remove(&id);
                if self.active_record() != Some(id) {
                    tracing::debug!(record = %id, "record no longer active, initial snapshot dropped");
                    return;
                }
                if !self.try_initial_snapshot(id) {
                    self.initial_pending.insert(id);
                    self.scheduler.schedule_after_settle(Task::InitialSnapshot(id));
                }
            }
            Task::RestoreRetry {
                record,
                roles,
                snapshot,
                reconciled,
            } => self.retry_restore(record, roles, &snapshot, reconciled),
            Task::RestoreSettled(id) => {
                if self.restoring != Some(id) {
                    return;
                }
                self.state = ControllerState::Ready;
                self.restoring = None;
                tracing::debug!(record = %id, "restore settled");
                for parked in std::mem::take(&mut self.parked_edits) {
                    self.merge_views(parked);
                    self.schedule_capture(parked);
                }
            }
        }
    }

    fn retry_restore(
        &mut self,
        id: RecordId,
        roles: Vec<ViewRole>,
        snapshot: &Snapshot,
        reconciled: bool,
    ) {
        if self.active_record() != Some(id) {
            tracing::warn!(record = %id, "record no longer active, restore abandoned");
            return;
        }
        for role in roles {
            let Some(slot) = self.slot(role) else {
                continue;
            };
            let view = &mut self.views[slot];
            if view.showing != Some(id) {
                continue;
            }
            match view.parts_mut() {
                Some((doc, index)) => {
                    snapshot::restore(doc, index, snapshot);
                    binding::clear_highlights(doc, index);
                }
                None => tracing::warn!(record = %id, %role, "view still unavailable, restore abandoned"),
            }
        }
        if !reconciled {
            self.reconcile(id, snapshot);
        }
    }
}
