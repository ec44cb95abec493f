//! Host capabilities for text selection and page geometry, and the capture
//! step that turns a live selection into page-relative rectangles.

use crate::geometry::{normalize_rect, trailing_anchor};
use doc_model::{NormalizedRect, Point, ViewportRect};
use tracing::debug;

/// Snapshot of the host's live text selection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub text: String,
    /// One rectangle per selected line fragment, in viewport coordinates.
    pub rects: Vec<ViewportRect>,
}

impl Selection {
    pub fn new(text: impl Into<String>, rects: Vec<ViewportRect>) -> Self {
        Self { text: text.into(), rects }
    }

    pub fn is_collapsed(&self) -> bool {
        self.text.trim().is_empty() || self.rects.iter().all(ViewportRect::is_empty)
    }
}

pub trait SelectionSource {
    fn current_selection(&self) -> Option<Selection>;

    fn clear_selection(&mut self);
}

/// Rendered page geometry as the host currently lays it out.
pub trait PageLayout {
    fn page_box(&self, page_number: u32) -> Option<ViewportRect>;

    fn page_at(&self, point: Point) -> Option<u32>;
}

/// A selection source backed by a stored snapshot.
#[derive(Debug, Clone, Default)]
pub struct RecordedSelection {
    selection: Option<Selection>,
}

impl RecordedSelection {
    pub fn new(text: impl Into<String>, rects: Vec<ViewportRect>) -> Self {
        Self { selection: Some(Selection::new(text, rects)) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    pub fn is_cleared(&self) -> bool {
        self.selection.is_none()
    }
}

impl SelectionSource for RecordedSelection {
    fn current_selection(&self) -> Option<Selection> {
        self.selection.clone()
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }
}

/// Fixed page boxes, e.g. a frame's layout captured by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticLayout {
    pages: Vec<(u32, ViewportRect)>,
}

impl StaticLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page_number: u32, page_box: ViewportRect) -> Self {
        self.set_page(page_number, page_box);
        self
    }

    pub fn set_page(&mut self, page_number: u32, page_box: ViewportRect) {
        match self.pages.iter_mut().find(|(page, _)| *page == page_number) {
            Some(entry) => entry.1 = page_box,
            None => self.pages.push((page_number, page_box)),
        }
    }

    /// Equal-sized pages stacked vertically from `top` with `gap` between them.
    pub fn stacked(count: u32, top: f64, left: f64, width: f64, height: f64, gap: f64) -> Self {
        let pages = (0..count)
            .map(|index| {
                let page_top = top + f64::from(index) * (height + gap);
                (index + 1, ViewportRect::new(page_top, left, width, height))
            })
            .collect();

        Self { pages }
    }
}

impl PageLayout for StaticLayout {
    fn page_box(&self, page_number: u32) -> Option<ViewportRect> {
        self.pages.iter().find(|(page, _)| *page == page_number).map(|(_, rect)| *rect)
    }

    fn page_at(&self, point: Point) -> Option<u32> {
        self.pages.iter().find(|(_, rect)| rect.contains(point)).map(|(page, _)| *page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedSelection {
    pub page_number: u32,
    pub rects: Vec<NormalizedRect>,
    pub text: String,
    pub anchor: Point,
}

/// Reads the live selection and normalizes it against its page.
///
/// The page is the one containing the centre of the first selection
/// rectangle, or `fallback_page` when no page box contains it. An empty or
/// collapsed selection is not an error and yields `None`.
pub fn capture_selection(
    source: &dyn SelectionSource,
    layout: &dyn PageLayout,
    fallback_page: u32,
) -> Option<CapturedSelection> {
    let Some(selection) = source.current_selection() else {
        debug!("no live selection to capture");
        return None;
    };

    if selection.is_collapsed() {
        debug!("selection collapsed, nothing to capture");
        return None;
    }

    let rects: Vec<ViewportRect> =
        selection.rects.into_iter().filter(|rect| !rect.is_empty()).collect();
    let first = rects.first()?;
    let last = rects.last()?;

    let page_number = layout.page_at(first.center()).unwrap_or(fallback_page);
    let Some(page_box) = layout.page_box(page_number) else {
        debug!(page_number, "selection page is not rendered");
        return None;
    };

    let normalized: Vec<NormalizedRect> =
        rects.iter().filter_map(|rect| normalize_rect(rect, &page_box)).collect();

    if normalized.is_empty() {
        debug!(page_number, "selection lies outside its page box");
        return None;
    }

    Some(CapturedSelection {
        page_number,
        rects: normalized,
        text: selection.text.trim().to_owned(),
        anchor: trailing_anchor(last),
    })
}
