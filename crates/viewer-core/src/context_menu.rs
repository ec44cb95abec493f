use crate::ai_popup::{AiPopupController, AiRequest};
use crate::highlight::HighlightInteraction;
use crate::selection::{PageLayout, SelectionSource};
use doc_model::{ContextMenuState, PaperId, PendingSelection, Point, TargetLang};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    Highlight,
    Summarize,
    /// `None` uses the configured default language.
    Translate(Option<TargetLang>),
    Copy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextOutcome {
    HighlightPending(PendingSelection),
    AiRequested(AiRequest),
    /// Text for the host to put on the clipboard.
    Copy(String),
    Nothing,
}

/// Right-click menu over a text selection.
#[derive(Debug, Default)]
pub struct ContextMenuController {
    menu: Option<ContextMenuState>,
}

impl ContextMenuController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the menu for the live selection. Returns `false` and shows
    /// nothing when no text is selected.
    pub fn open(
        &mut self,
        paper_id: &PaperId,
        source: &dyn SelectionSource,
        anchor: Point,
        page_number: u32,
    ) -> bool {
        let text = source
            .current_selection()
            .map(|selection| selection.text.trim().to_owned())
            .unwrap_or_default();

        if text.is_empty() {
            debug!(paper = %paper_id, "context menu without selected text, ignoring");
            self.menu = None;
            return false;
        }

        self.menu = Some(ContextMenuState {
            paper_id: paper_id.clone(),
            anchor,
            selected_text: text,
            page_number,
        });
        true
    }

    pub fn state(&self) -> Option<&ContextMenuState> {
        self.menu.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.menu = None;
    }

    pub fn dismiss_for_paper(&mut self, paper_id: &PaperId) {
        if self.menu.as_ref().is_some_and(|menu| &menu.paper_id == paper_id) {
            self.menu = None;
        }
    }

    /// Closes the menu and runs `action` against the captured selection.
    pub fn dispatch(
        &mut self,
        action: ContextAction,
        highlights: &mut HighlightInteraction,
        ai: &mut AiPopupController,
        source: &dyn SelectionSource,
        layout: &dyn PageLayout,
        default_lang: TargetLang,
    ) -> ContextOutcome {
        let Some(menu) = self.menu.take() else {
            return ContextOutcome::Nothing;
        };

        match action {
            ContextAction::Highlight => highlights
                .capture_from_selection(&menu.paper_id, menu.page_number, source, layout)
                .cloned()
                .map_or(ContextOutcome::Nothing, ContextOutcome::HighlightPending),
            ContextAction::Summarize => ContextOutcome::AiRequested(ai.open_summary(
                &menu.paper_id,
                menu.anchor,
                &menu.selected_text,
            )),
            ContextAction::Translate(lang) => ContextOutcome::AiRequested(ai.open_translation(
                &menu.paper_id,
                menu.anchor,
                &menu.selected_text,
                lang.unwrap_or(default_lang),
            )),
            ContextAction::Copy => ContextOutcome::Copy(menu.selected_text),
        }
    }
}
