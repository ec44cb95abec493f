//! One reader window: tabs plus the interaction state shared across them.
//!
//! `ReaderSession` is what a host drives from its event loop. Each method maps
//! to a user or renderer event and forwards to the component that owns the
//! behavior; the session adds the cross-component steps, such as dropping a
//! paper's highlights and AI popup when its tab closes.

use crate::ai_popup::{AiPopupController, AiRequest, Disposition, RequestTicket};
use crate::context_menu::{ContextAction, ContextMenuController, ContextOutcome};
use crate::error::{AiError, AssetError, ViewerError, ViewerResult};
use crate::highlight::{HighlightInteraction, HighlightPopup, RenderedHighlight};
use crate::scroll::{PageElement, ScrollPositionTracker, ScrollViewport};
use crate::selection::{PageLayout, SelectionSource};
use crate::services::AnnotationStore;
use crate::tabs::{AssetRequest, OpenOutcome, TabRegistry, TabState};
use crate::viewport::{PageNavigation, ViewportController};
use doc_model::{
    AssetHandle, FitMode, Highlight, HighlightId, PaperId, PendingSelection, Point, Tab, TargetLang,
    ViewMode, ViewerConfig, ViewportRect,
};
use std::time::{Duration, Instant};
use tracing::info;

pub struct ReaderSession<S: AnnotationStore> {
    config: ViewerConfig,
    tabs: TabRegistry,
    viewport: ViewportController,
    scroll: ScrollPositionTracker,
    highlights: HighlightInteraction,
    context_menu: ContextMenuController,
    ai: AiPopupController,
    store: S,
}

impl<S: AnnotationStore> ReaderSession<S> {
    pub fn new(config: ViewerConfig, store: S) -> Self {
        Self {
            tabs: TabRegistry::new(config.default_view_mode),
            viewport: ViewportController::new(&config),
            scroll: ScrollPositionTracker::new(Duration::from_millis(config.scroll_throttle_ms)),
            highlights: HighlightInteraction::new(&config),
            context_menu: ContextMenuController::new(),
            ai: AiPopupController::new(),
            config,
            store,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.tabs
    }

    pub fn highlights(&self) -> &HighlightInteraction {
        &self.highlights
    }

    pub fn highlights_mut(&mut self) -> &mut HighlightInteraction {
        &mut self.highlights
    }

    pub fn ai_popup(&self) -> &AiPopupController {
        &self.ai
    }

    pub fn context_menu(&self) -> &ContextMenuController {
        &self.context_menu
    }

    pub fn viewport_controller(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // Tabs

    pub fn open(&mut self, doc: Tab) -> OpenOutcome {
        let outcome = self.tabs.open_or_focus(doc);
        self.scroll.reset();
        outcome
    }

    pub fn asset_resolved(
        &mut self,
        paper_id: &PaperId,
        generation: u64,
        result: Result<AssetHandle, AssetError>,
    ) -> bool {
        self.tabs.asset_resolved(paper_id, generation, result)
    }

    pub fn retry_asset(&mut self, paper_id: &PaperId) -> ViewerResult<AssetRequest> {
        self.tabs.retry_asset(paper_id)
    }

    pub fn activate(&mut self, paper_id: &PaperId) -> ViewerResult<()> {
        if !self.tabs.activate(paper_id) {
            return Err(ViewerError::UnknownTab(paper_id.clone()));
        }

        self.context_menu.dismiss();
        self.scroll.reset();
        Ok(())
    }

    /// Closes a tab and releases everything any component holds for it.
    pub fn close_tab(&mut self, paper_id: &PaperId) -> Option<Tab> {
        let tab = self.tabs.close(paper_id)?;

        self.highlights.forget_paper(paper_id);
        self.ai.close_for_paper(paper_id);
        self.context_menu.dismiss_for_paper(paper_id);
        self.scroll.reset();

        info!(paper = %paper_id, active = ?self.tabs.active_id(), "released tab state");
        Some(tab)
    }

    pub fn active_state(&self) -> Option<&TabState> {
        self.tabs.state(self.tabs.active_id()?)
    }

    // Renderer reports

    pub fn document_loaded(&mut self, paper_id: &PaperId, page_count: u32) -> ViewerResult<()> {
        let state = self.tabs.state_mut(paper_id)?;
        self.viewport.document_loaded(&mut state.viewport, page_count);
        Ok(())
    }

    /// Intrinsic size of a rendered page. Only the first report per tab is kept.
    pub fn page_dimensions(
        &mut self,
        paper_id: &PaperId,
        width: f64,
        _height: f64,
    ) -> ViewerResult<bool> {
        let state = self.tabs.state_mut(paper_id)?;
        Ok(self.viewport.capture_page_width(&mut state.viewport, width))
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.viewport.set_container_width(width);
    }

    // Zoom and navigation on the active tab

    pub fn change_scale(&mut self, delta: f64) -> ViewerResult<f64> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.change_scale(&mut state.viewport, delta))
    }

    pub fn zoom_in(&mut self) -> ViewerResult<f64> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.zoom_in(&mut state.viewport))
    }

    pub fn zoom_out(&mut self) -> ViewerResult<f64> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.zoom_out(&mut state.viewport))
    }

    pub fn reset_zoom(&mut self) -> ViewerResult<()> {
        let (_, state) = self.tabs.active_state_mut()?;
        self.viewport.reset_zoom(&mut state.viewport);
        Ok(())
    }

    pub fn toggle_fit_width(&mut self) -> ViewerResult<FitMode> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.toggle_fit_width(&mut state.viewport))
    }

    pub fn effective_scale(&self, paper_id: &PaperId) -> ViewerResult<f64> {
        let state =
            self.tabs.state(paper_id).ok_or_else(|| ViewerError::UnknownTab(paper_id.clone()))?;
        Ok(self.viewport.effective_scale(&state.viewport))
    }

    pub fn go_to_page(&mut self, page: u32) -> ViewerResult<PageNavigation> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.go_to_page(&mut state.viewport, page))
    }

    pub fn next_page(&mut self) -> ViewerResult<PageNavigation> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.next_page(&mut state.viewport))
    }

    pub fn previous_page(&mut self) -> ViewerResult<PageNavigation> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.viewport.previous_page(&mut state.viewport))
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> ViewerResult<PageNavigation> {
        let (_, state) = self.tabs.active_state_mut()?;
        self.scroll.reset();
        Ok(self.viewport.set_view_mode(&mut state.viewport, mode))
    }

    pub fn on_scroll(
        &mut self,
        now: Instant,
        viewport: ScrollViewport,
        elements: &[PageElement],
    ) -> ViewerResult<Option<u32>> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.scroll.on_scroll(now, &mut state.viewport, viewport, elements))
    }

    pub fn on_scroll_end(
        &mut self,
        viewport: ScrollViewport,
        elements: &[PageElement],
    ) -> ViewerResult<Option<u32>> {
        let (_, state) = self.tabs.active_state_mut()?;
        Ok(self.scroll.on_scroll_end(&mut state.viewport, viewport, elements))
    }

    // Highlights

    pub fn toggle_highlight_mode(&mut self) -> bool {
        self.highlights.toggle_highlight_mode()
    }

    pub fn on_pointer_release(
        &mut self,
        source: &dyn SelectionSource,
        layout: &dyn PageLayout,
    ) -> ViewerResult<Option<PendingSelection>> {
        let (paper_id, current_page) = self.active_page()?;
        Ok(self.highlights.on_pointer_release(&paper_id, current_page, source, layout).cloned())
    }

    pub fn confirm_highlight(
        &mut self,
        source: &mut dyn SelectionSource,
    ) -> ViewerResult<Highlight> {
        self.highlights.confirm(&mut self.store, source)
    }

    pub fn cancel_highlight(&mut self, source: &mut dyn SelectionSource) {
        self.highlights.cancel(source);
    }

    /// A click on the page: opens the edit popup when it lands on a highlight.
    pub fn click(
        &mut self,
        page_number: u32,
        point: Point,
        layout: &dyn PageLayout,
    ) -> ViewerResult<Option<&HighlightPopup>> {
        let paper_id = self.tabs.active_id().cloned().ok_or(ViewerError::NoActiveTab)?;
        self.highlights.ensure_loaded(&self.store, &paper_id)?;

        let hit = self.highlights.hit_test(&paper_id, page_number, point, layout);
        let Some(highlight_id) = hit else {
            return Ok(None);
        };

        self.highlights.begin_edit(&paper_id, &highlight_id, layout).map(Some)
    }

    pub fn delete_highlight_from_popup(&mut self) -> ViewerResult<()> {
        self.highlights.delete_from_popup(&mut self.store)
    }

    pub fn delete_highlight(
        &mut self,
        paper_id: &PaperId,
        highlight_id: &HighlightId,
    ) -> ViewerResult<()> {
        self.highlights.ensure_loaded(&self.store, paper_id)?;
        self.highlights.delete_highlight(&mut self.store, paper_id, highlight_id)
    }

    pub fn highlights_for_page(
        &mut self,
        paper_id: &PaperId,
        page_number: u32,
    ) -> ViewerResult<Vec<Highlight>> {
        self.highlights.highlights_for_page(&self.store, paper_id, page_number)
    }

    pub fn render_highlights(
        &mut self,
        paper_id: &PaperId,
        page_number: u32,
        page_box: &ViewportRect,
    ) -> ViewerResult<Vec<RenderedHighlight>> {
        self.highlights.ensure_loaded(&self.store, paper_id)?;
        Ok(self.highlights.render_rects(paper_id, page_number, page_box))
    }

    // Context menu and AI

    pub fn open_context_menu(
        &mut self,
        source: &dyn SelectionSource,
        anchor: Point,
        page_number: u32,
    ) -> ViewerResult<bool> {
        let paper_id = self.tabs.active_id().cloned().ok_or(ViewerError::NoActiveTab)?;
        Ok(self.context_menu.open(&paper_id, source, anchor, page_number))
    }

    pub fn context_action(
        &mut self,
        action: ContextAction,
        source: &dyn SelectionSource,
        layout: &dyn PageLayout,
    ) -> ContextOutcome {
        self.context_menu.dispatch(
            action,
            &mut self.highlights,
            &mut self.ai,
            source,
            layout,
            self.config.default_target_lang,
        )
    }

    pub fn dismiss_context_menu(&mut self) {
        self.context_menu.dismiss();
    }

    pub fn ai_completed(
        &mut self,
        ticket: RequestTicket,
        result: Result<String, AiError>,
    ) -> Disposition {
        self.ai.complete(ticket, result)
    }

    pub fn set_ai_target_lang(
        &mut self,
        target_lang: TargetLang,
    ) -> ViewerResult<Option<AiRequest>> {
        self.ai.set_target_lang(target_lang)
    }

    pub fn retry_ai(&mut self) -> ViewerResult<Option<AiRequest>> {
        self.ai.retry()
    }

    pub fn close_ai_popup(&mut self) {
        self.ai.close();
    }

    fn active_page(&self) -> ViewerResult<(PaperId, u32)> {
        let paper_id = self.tabs.active_id().ok_or(ViewerError::NoActiveTab)?;
        let state =
            self.tabs.state(paper_id).ok_or_else(|| ViewerError::UnknownTab(paper_id.clone()))?;
        Ok((paper_id.clone(), state.viewport.current_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{RecordedSelection, StaticLayout};
    use crate::services::MemoryAnnotationStore;
    use doc_model::{AiKind, AssetState};

    fn doc(id: &str) -> Tab {
        Tab::new(id, format!("{id}.pdf"), format!("/papers/{id}.pdf"))
    }

    fn session() -> ReaderSession<MemoryAnnotationStore> {
        ReaderSession::new(ViewerConfig::default(), MemoryAnnotationStore::new())
    }

    fn open_ready(
        session: &mut ReaderSession<MemoryAnnotationStore>,
        id: &str,
        pages: u32,
    ) -> PaperId {
        let OpenOutcome::Opened(request) = session.open(doc(id)) else {
            panic!("expected a new tab");
        };
        let handle = AssetHandle { uri: format!("asset://{id}") };
        assert!(session.asset_resolved(&request.paper_id, request.generation, Ok(handle)));
        session.document_loaded(&request.paper_id, pages).expect("tab open");
        session.page_dimensions(&request.paper_id, 600.0, 800.0).expect("tab open");
        request.paper_id
    }

    #[test]
    fn zoom_and_fit_are_per_tab() {
        let mut session = session();
        let a = open_ready(&mut session, "a", 10);
        let b = open_ready(&mut session, "b", 10);
        session.set_container_width(900.0);

        session.activate(&a).expect("tab open");
        for _ in 0..6 {
            session.zoom_in().expect("active tab");
        }
        assert_eq!(session.effective_scale(&a).expect("tab open"), 2.5);

        session.toggle_fit_width().expect("active tab");
        assert!((session.effective_scale(&a).expect("tab open") - 1.42).abs() < 1e-9);
        assert_eq!(session.effective_scale(&b).expect("tab open"), 1.0);
    }

    #[test]
    fn selection_becomes_a_stored_highlight_on_the_right_page() {
        let mut session = session();
        let paper = open_ready(&mut session, "paper-1", 5);
        let layout = StaticLayout::stacked(5, 0.0, 0.0, 600.0, 800.0, 0.0);
        let mut source = RecordedSelection::new(
            "scaled dot-product attention",
            vec![
                ViewportRect::new(1700.0, 60.0, 480.0, 18.0),
                ViewportRect::new(1720.0, 60.0, 200.0, 18.0),
            ],
        );

        session.toggle_highlight_mode();
        let pending =
            session.on_pointer_release(&source, &layout).expect("active tab").expect("pending");
        assert_eq!(pending.page_number, 3);

        session.highlights_mut().set_popup_color("#ffeb3b").expect("popup open");
        let highlight = session.confirm_highlight(&mut source).expect("stored");

        assert_eq!(highlight.rects.len(), 2);
        assert_eq!(highlight.color, "#ffeb3b");
        let on_page = session.highlights_for_page(&paper, 3).expect("store readable");
        assert_eq!(on_page, vec![highlight]);
    }

    #[test]
    fn clicking_a_highlight_then_deleting_it() {
        let mut session = session();
        let paper = open_ready(&mut session, "paper-1", 2);
        let layout = StaticLayout::stacked(2, 0.0, 0.0, 600.0, 800.0, 0.0);
        let mut source =
            RecordedSelection::new("word", vec![ViewportRect::new(100.0, 100.0, 60.0, 20.0)]);

        session.toggle_highlight_mode();
        session.on_pointer_release(&source, &layout).expect("active tab");
        session.confirm_highlight(&mut source).expect("stored");

        assert!(session.click(1, Point::new(10.0, 10.0), &layout).expect("active tab").is_none());
        let popup =
            session.click(1, Point::new(130.0, 110.0), &layout).expect("active tab").expect("hit");
        assert_eq!(popup.paper_id, paper);

        session.delete_highlight_from_popup().expect("deleted");
        assert!(session.store().is_empty());
        let page_box = ViewportRect::new(0.0, 0.0, 600.0, 800.0);
        assert!(session.render_highlights(&paper, 1, &page_box).expect("ok").is_empty());
    }

    #[test]
    fn scrolling_in_continuous_mode_moves_the_current_page() {
        let mut session = session();
        open_ready(&mut session, "a", 4);
        let elements: Vec<_> =
            (0..4).map(|i| PageElement::new(i + 1, f64::from(i) * 800.0, 800.0)).collect();

        let third = ScrollViewport::new(1600.0, 800.0);
        let page = session.on_scroll_end(third, &elements).expect("active tab");
        assert_eq!(page, Some(3));
        assert_eq!(session.active_state().expect("active").viewport.current_page, 3);

        assert_eq!(
            session.set_view_mode(ViewMode::SinglePage).expect("active tab"),
            PageNavigation::SwapPage(3)
        );
        let top = ScrollViewport::new(0.0, 800.0);
        assert_eq!(session.on_scroll_end(top, &elements).expect("active tab"), None);
    }

    #[test]
    fn context_menu_translation_round_trip_discards_the_stale_response() {
        let mut session = session();
        open_ready(&mut session, "a", 2);
        let layout = StaticLayout::stacked(2, 0.0, 0.0, 600.0, 800.0, 0.0);
        let source =
            RecordedSelection::new("hello", vec![ViewportRect::new(100.0, 100.0, 60.0, 20.0)]);

        let opened = session.open_context_menu(&source, Point::new(160.0, 120.0), 1);
        assert!(opened.expect("active tab"));
        let ContextOutcome::AiRequested(korean) =
            session.context_action(ContextAction::Translate(None), &source, &layout)
        else {
            panic!("expected an AI request");
        };
        assert_eq!(korean.kind, AiKind::Translation);
        assert_eq!(korean.target_lang, Some(TargetLang::Ko));

        let english = session.set_ai_target_lang(TargetLang::En).expect("popup").expect("request");
        assert_eq!(
            session.ai_completed(english.ticket, Ok("hello".to_owned())),
            Disposition::Applied
        );
        assert_eq!(
            session.ai_completed(korean.ticket, Ok("안녕하세요".to_owned())),
            Disposition::Stale
        );
        assert_eq!(session.ai_popup().copy_text(), Some("hello"));
    }

    #[test]
    fn closing_a_tab_releases_every_component() {
        let mut session = session();
        let a = open_ready(&mut session, "a", 2);
        let b = open_ready(&mut session, "b", 2);
        let layout = StaticLayout::stacked(2, 0.0, 0.0, 600.0, 800.0, 0.0);
        let mut source =
            RecordedSelection::new("text", vec![ViewportRect::new(100.0, 100.0, 60.0, 20.0)]);

        session.toggle_highlight_mode();
        session.on_pointer_release(&source, &layout).expect("active tab");
        session.confirm_highlight(&mut source).expect("stored");
        session.highlights_for_page(&b, 1).expect("loaded");

        source.set(crate::selection::Selection::new(
            "more",
            vec![ViewportRect::new(200.0, 100.0, 60.0, 20.0)],
        ));
        session.open_context_menu(&source, Point::default(), 1).expect("active tab");
        session.context_action(ContextAction::Summarize, &source, &layout);
        assert!(session.ai_popup().state().is_some());

        let asset = session.tabs().state(&b).map(|state| state.asset.clone());
        assert!(matches!(asset, Some(AssetState::Ready(_))));

        session.close_tab(&b).expect("b was open");
        assert!(session.tabs().state(&b).is_none());
        assert!(session.highlights().cached(&b).is_none());
        assert!(session.ai_popup().state().is_none());
        assert_eq!(session.tabs().active_id(), Some(&a));
        assert!(matches!(session.go_to_page(2), Ok(PageNavigation::ScrollIntoView(2))));

        session.close_tab(&a).expect("a was open");
        assert!(matches!(session.zoom_in(), Err(ViewerError::NoActiveTab)));
    }

    #[test]
    fn late_asset_for_a_closed_tab_is_ignored() {
        let mut session = session();
        let OpenOutcome::Opened(request) = session.open(doc("a")) else {
            panic!("expected a new tab");
        };
        session.close_tab(&request.paper_id);

        let handle = AssetHandle { uri: "asset://a".to_owned() };
        assert!(!session.asset_resolved(&request.paper_id, request.generation, Ok(handle)));
        assert!(session.tabs().is_empty());
        assert!(matches!(session.activate(&request.paper_id), Err(ViewerError::UnknownTab(_))));
    }

    #[test]
    fn reopening_a_document_that_failed_to_resolve_requests_it_again() {
        let mut session = session();
        let OpenOutcome::Opened(request) = session.open(doc("a")) else {
            panic!("expected a new tab");
        };
        let error = AssetError::NotFound(request.path.clone());
        assert!(session.asset_resolved(&request.paper_id, request.generation, Err(error)));

        let OpenOutcome::Retried(retry) = session.open(doc("a")) else {
            panic!("expected the failed asset to be requested again");
        };
        let handle = AssetHandle { uri: "asset://a".to_owned() };
        assert!(session.asset_resolved(&retry.paper_id, retry.generation, Ok(handle)));

        let state = session.tabs().state(&retry.paper_id).expect("tab open");
        assert!(matches!(state.asset, AssetState::Ready(_)));
    }
}
