//! Selection-to-highlight flow: capture a pending selection, edit it in a
//! popup, persist it through the annotation store, and edit or delete
//! existing highlights found by hit-testing.

use crate::error::{ViewerError, ViewerResult};
use crate::geometry::{expand_rect, trailing_anchor};
use crate::selection::{capture_selection, PageLayout, SelectionSource};
use crate::services::AnnotationStore;
use doc_model::{
    is_valid_color, CreateHighlightInput, Highlight, HighlightId, HighlightPatch, ModelError,
    MutationFailurePolicy, PaperId, PendingSelection, Point, ViewerConfig, ViewportRect,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupMode {
    Create,
    Edit { highlight_id: HighlightId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightPopup {
    pub paper_id: PaperId,
    pub mode: PopupMode,
    pub anchor: Point,
    pub color: String,
    pub note: String,
}

/// A stored rectangle expanded against the page box it is drawn in this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedHighlight {
    pub id: HighlightId,
    pub color: String,
    pub rect: ViewportRect,
}

#[derive(Debug)]
pub struct HighlightInteraction {
    highlight_mode: bool,
    pending: Option<PendingSelection>,
    popup: Option<HighlightPopup>,
    /// Read-through copy of the store, loaded per paper on first use.
    cache: HashMap<PaperId, Vec<Highlight>>,
    default_color: String,
    failure_policy: MutationFailurePolicy,
}

impl HighlightInteraction {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            highlight_mode: false,
            pending: None,
            popup: None,
            cache: HashMap::new(),
            default_color: config.default_color.clone(),
            failure_policy: config.mutation_failure,
        }
    }

    pub fn highlight_mode(&self) -> bool {
        self.highlight_mode
    }

    pub fn set_highlight_mode(&mut self, enabled: bool) {
        self.highlight_mode = enabled;
    }

    pub fn toggle_highlight_mode(&mut self) -> bool {
        self.highlight_mode = !self.highlight_mode;
        self.highlight_mode
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    pub fn popup(&self) -> Option<&HighlightPopup> {
        self.popup.as_ref()
    }

    /// Pointer release over the document. Only captures in highlight mode.
    pub fn on_pointer_release(
        &mut self,
        paper_id: &PaperId,
        current_page: u32,
        source: &dyn SelectionSource,
        layout: &dyn PageLayout,
    ) -> Option<&PendingSelection> {
        if !self.highlight_mode {
            return None;
        }

        self.capture_from_selection(paper_id, current_page, source, layout)
    }

    /// Turns the still-live selection into a pending highlight and opens the
    /// create popup at the trailing edge of the last selected rectangle.
    pub fn capture_from_selection(
        &mut self,
        paper_id: &PaperId,
        current_page: u32,
        source: &dyn SelectionSource,
        layout: &dyn PageLayout,
    ) -> Option<&PendingSelection> {
        let captured = capture_selection(source, layout, current_page)?;

        debug!(
            paper = %paper_id,
            page = captured.page_number,
            rects = captured.rects.len(),
            "captured pending highlight"
        );

        self.popup = Some(HighlightPopup {
            paper_id: paper_id.clone(),
            mode: PopupMode::Create,
            anchor: captured.anchor,
            color: self.default_color.clone(),
            note: String::new(),
        });
        self.pending = Some(PendingSelection {
            paper_id: paper_id.clone(),
            page_number: captured.page_number,
            rects: captured.rects,
            text: captured.text,
            anchor: captured.anchor,
        });
        self.pending.as_ref()
    }

    pub fn set_popup_color(&mut self, color: &str) -> ViewerResult<()> {
        if !is_valid_color(color) {
            return Err(ModelError::InvalidColor(color.to_owned()).into());
        }

        let popup = self.popup.as_mut().ok_or(ViewerError::NoPopup)?;
        popup.color = color.to_owned();
        Ok(())
    }

    pub fn set_popup_note(&mut self, note: &str) -> ViewerResult<()> {
        let popup = self.popup.as_mut().ok_or(ViewerError::NoPopup)?;
        popup.note = note.to_owned();
        Ok(())
    }

    /// Confirms the open popup: creates the pending highlight, or updates the
    /// one being edited.
    pub fn confirm(
        &mut self,
        store: &mut dyn AnnotationStore,
        source: &mut dyn SelectionSource,
    ) -> ViewerResult<Highlight> {
        let popup = self.popup.take().ok_or(ViewerError::NoPopup)?;

        match popup.mode {
            PopupMode::Create => {
                let pending = self.pending.take().ok_or(ViewerError::NoPopup)?;
                source.clear_selection();

                let input = CreateHighlightInput {
                    paper_id: pending.paper_id,
                    page_number: pending.page_number,
                    rects: pending.rects,
                    selected_text: pending.text,
                    color: Some(popup.color),
                    note: Some(popup.note).filter(|note| !note.is_empty()),
                };

                match store.create(input) {
                    Ok(highlight) => {
                        info!(paper = %highlight.paper_id, id = %highlight.id, "highlight created");
                        if let Some(cached) = self.cache.get_mut(&highlight.paper_id) {
                            cached.push(highlight.clone());
                            cached.sort_by_key(|h| h.page_number);
                        }
                        Ok(highlight)
                    }
                    Err(error) => {
                        warn!(%error, "creating highlight failed");
                        Err(error.into())
                    }
                }
            }
            PopupMode::Edit { highlight_id } => {
                let patch = HighlightPatch { color: Some(popup.color), note: Some(popup.note) };
                self.update_highlight(store, &popup.paper_id, &highlight_id, patch)
            }
        }
    }

    /// Drops the pending selection or edit popup without touching the store.
    pub fn cancel(&mut self, source: &mut dyn SelectionSource) {
        self.pending = None;
        self.popup = None;
        source.clear_selection();
    }

    /// Cached highlight on `page_number` whose rendered rectangle contains `point`.
    /// Later highlights are drawn on top, so they win.
    pub fn hit_test(
        &self,
        paper_id: &PaperId,
        page_number: u32,
        point: Point,
        layout: &dyn PageLayout,
    ) -> Option<HighlightId> {
        let page_box = layout.page_box(page_number)?;

        self.cache
            .get(paper_id)?
            .iter()
            .rev()
            .filter(|h| h.page_number == page_number)
            .find(|h| h.rects.iter().any(|rect| expand_rect(rect, &page_box).contains(point)))
            .map(|h| h.id.clone())
    }

    /// Opens the popup in edit mode for a cached highlight, anchored at its
    /// first rectangle as laid out now.
    pub fn begin_edit(
        &mut self,
        paper_id: &PaperId,
        highlight_id: &HighlightId,
        layout: &dyn PageLayout,
    ) -> ViewerResult<&HighlightPopup> {
        let highlight = self
            .find_cached(paper_id, highlight_id)
            .ok_or_else(|| ViewerError::UnknownHighlight(highlight_id.clone()))?;

        let page_box = layout
            .page_box(highlight.page_number)
            .ok_or(ViewerError::PageNotRendered(highlight.page_number))?;
        let first = highlight
            .rects
            .first()
            .ok_or_else(|| ViewerError::UnknownHighlight(highlight_id.clone()))?;

        let popup = HighlightPopup {
            paper_id: paper_id.clone(),
            mode: PopupMode::Edit { highlight_id: highlight_id.clone() },
            anchor: trailing_anchor(&expand_rect(first, &page_box)),
            color: highlight.color.clone(),
            note: highlight.note.clone(),
        };

        self.pending = None;
        Ok(self.popup.insert(popup))
    }

    /// Deletes the highlight being edited in the popup.
    pub fn delete_from_popup(&mut self, store: &mut dyn AnnotationStore) -> ViewerResult<()> {
        let Some(HighlightPopup { mode: PopupMode::Edit { .. }, .. }) = &self.popup else {
            return Err(ViewerError::NoPopup);
        };

        let Some(HighlightPopup { paper_id, mode: PopupMode::Edit { highlight_id }, .. }) =
            self.popup.take()
        else {
            return Err(ViewerError::NoPopup);
        };

        self.delete_highlight(store, &paper_id, &highlight_id)
    }

    /// Applies `patch` to the cache first, then to the store.
    pub fn update_highlight(
        &mut self,
        store: &mut dyn AnnotationStore,
        paper_id: &PaperId,
        highlight_id: &HighlightId,
        patch: HighlightPatch,
    ) -> ViewerResult<Highlight> {
        patch.validate()?;

        let cached = self
            .find_cached_mut(paper_id, highlight_id)
            .ok_or_else(|| ViewerError::UnknownHighlight(highlight_id.clone()))?;
        let previous = cached.clone();
        cached.apply_patch(&patch);

        match store.update(highlight_id, patch) {
            Ok(updated) => {
                info!(id = %highlight_id, "highlight updated");
                if let Some(cached) = self.find_cached_mut(paper_id, highlight_id) {
                    *cached = updated.clone();
                }
                Ok(updated)
            }
            Err(error) => {
                warn!(
                    id = %highlight_id,
                    %error,
                    policy = ?self.failure_policy,
                    "updating highlight failed"
                );
                if self.failure_policy == MutationFailurePolicy::Revert {
                    if let Some(cached) = self.find_cached_mut(paper_id, highlight_id) {
                        *cached = previous;
                    }
                }
                Err(error.into())
            }
        }
    }

    /// Removes the highlight from the cache first, then from the store.
    pub fn delete_highlight(
        &mut self,
        store: &mut dyn AnnotationStore,
        paper_id: &PaperId,
        highlight_id: &HighlightId,
    ) -> ViewerResult<()> {
        let cached = self
            .cache
            .get_mut(paper_id)
            .ok_or_else(|| ViewerError::UnknownHighlight(highlight_id.clone()))?;
        let index = cached
            .iter()
            .position(|h| &h.id == highlight_id)
            .ok_or_else(|| ViewerError::UnknownHighlight(highlight_id.clone()))?;
        let removed = cached.remove(index);

        match store.delete(highlight_id) {
            Ok(()) => {
                info!(id = %highlight_id, "highlight deleted");
                Ok(())
            }
            Err(error) => {
                warn!(
                    id = %highlight_id,
                    %error,
                    policy = ?self.failure_policy,
                    "deleting highlight failed"
                );
                if self.failure_policy == MutationFailurePolicy::Revert {
                    if let Some(cached) = self.cache.get_mut(paper_id) {
                        cached.insert(index.min(cached.len()), removed);
                    }
                }
                Err(error.into())
            }
        }
    }

    /// Loads a paper's highlights from the store unless already cached.
    pub fn ensure_loaded(
        &mut self,
        store: &dyn AnnotationStore,
        paper_id: &PaperId,
    ) -> ViewerResult<&[Highlight]> {
        if !self.cache.contains_key(paper_id) {
            self.refresh(store, paper_id)?;
        }

        Ok(self.cache.get(paper_id).map(Vec::as_slice).unwrap_or_default())
    }

    /// Replaces the cached highlights of a paper with the store's current view.
    pub fn refresh(&mut self, store: &dyn AnnotationStore, paper_id: &PaperId) -> ViewerResult<()> {
        let highlights = store.list(paper_id, None)?;
        debug!(paper = %paper_id, count = highlights.len(), "loaded highlights");
        self.cache.insert(paper_id.clone(), highlights);
        Ok(())
    }

    pub fn highlights_for_page(
        &mut self,
        store: &dyn AnnotationStore,
        paper_id: &PaperId,
        page_number: u32,
    ) -> ViewerResult<Vec<Highlight>> {
        let all = self.ensure_loaded(store, paper_id)?;
        Ok(all.iter().filter(|h| h.page_number == page_number).cloned().collect())
    }

    pub fn cached(&self, paper_id: &PaperId) -> Option<&[Highlight]> {
        self.cache.get(paper_id).map(Vec::as_slice)
    }

    /// Expands every cached rectangle on a page against the page's current box.
    pub fn render_rects(
        &self,
        paper_id: &PaperId,
        page_number: u32,
        page_box: &ViewportRect,
    ) -> Vec<RenderedHighlight> {
        let Some(highlights) = self.cache.get(paper_id) else {
            return Vec::new();
        };

        highlights
            .iter()
            .filter(|h| h.page_number == page_number)
            .flat_map(|h| {
                h.rects.iter().map(|rect| RenderedHighlight {
                    id: h.id.clone(),
                    color: h.color.clone(),
                    rect: expand_rect(rect, page_box),
                })
            })
            .collect()
    }

    /// Drops everything held for a paper whose tab closed.
    pub fn forget_paper(&mut self, paper_id: &PaperId) {
        self.cache.remove(paper_id);

        if self.pending.as_ref().is_some_and(|pending| &pending.paper_id == paper_id) {
            self.pending = None;
        }
        if self.popup.as_ref().is_some_and(|popup| &popup.paper_id == paper_id) {
            self.popup = None;
        }
    }

    fn find_cached(&self, paper_id: &PaperId, highlight_id: &HighlightId) -> Option<&Highlight> {
        self.cache.get(paper_id)?.iter().find(|h| &h.id == highlight_id)
    }

    fn find_cached_mut(
        &mut self,
        paper_id: &PaperId,
        highlight_id: &HighlightId,
    ) -> Option<&mut Highlight> {
        self.cache.get_mut(paper_id)?.iter_mut().find(|h| &h.id == highlight_id)
    }
}
