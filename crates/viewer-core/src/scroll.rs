//! Reading-position inference for continuous mode.
//!
//! The current page is the rendered page whose vertical centre is nearest the
//! viewport's vertical centre. Unlike "first fully visible page" this stays
//! stable while several pages are partly visible and needs no page-boundary
//! events from the renderer.

use doc_model::{ViewMode, ViewportState};
use std::time::{Duration, Instant};
use tracing::debug;

/// A rendered page element, in the same vertical coordinate space as the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageElement {
    pub page_number: u32,
    pub top: f64,
    pub height: f64,
}

impl PageElement {
    pub fn new(page_number: u32, top: f64, height: f64) -> Self {
        Self { page_number, top, height }
    }

    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollViewport {
    pub top: f64,
    pub height: f64,
}

impl ScrollViewport {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Page whose centre is nearest the viewport centre; ties go to the earlier page.
///
/// Hosts pass elements in stacking order (ascending `top`) and get a binary
/// search. Elements out of order are searched through a sorted copy instead.
pub fn nearest_page(viewport: ScrollViewport, elements: &[PageElement]) -> Option<u32> {
    let center = viewport.center();
    if elements.windows(2).all(|pair| pair[0].center() <= pair[1].center()) {
        return nearest_in_stacking_order(center, elements);
    }

    debug!(count = elements.len(), "page elements out of stacking order, sorting a copy");
    let mut sorted = elements.to_vec();
    sorted.sort_by(|a, b| {
        a.center().total_cmp(&b.center()).then(a.page_number.cmp(&b.page_number))
    });
    nearest_in_stacking_order(center, &sorted)
}

fn nearest_in_stacking_order(center: f64, elements: &[PageElement]) -> Option<u32> {
    let split = elements.partition_point(|element| element.center() < center);

    let before = split.checked_sub(1).and_then(|index| elements.get(index));
    let after = elements.get(split);

    match (before, after) {
        (Some(before), Some(after)) => {
            let before_distance = (center - before.center()).abs();
            let after_distance = (after.center() - center).abs();
            if after_distance < before_distance {
                Some(after.page_number)
            } else {
                Some(before.page_number)
            }
        }
        (Some(only), None) | (None, Some(only)) => Some(only.page_number),
        (None, None) => None,
    }
}

/// Updates the current page from scroll events, at most once per throttle interval.
#[derive(Debug, Clone)]
pub struct ScrollPositionTracker {
    throttle: Duration,
    last_evaluated: Option<Instant>,
}

impl ScrollPositionTracker {
    pub fn new(throttle: Duration) -> Self {
        Self { throttle, last_evaluated: None }
    }

    /// Handles one scroll tick. Returns the new current page when it changed.
    pub fn on_scroll(
        &mut self,
        now: Instant,
        state: &mut ViewportState,
        viewport: ScrollViewport,
        elements: &[PageElement],
    ) -> Option<u32> {
        if let Some(last) = self.last_evaluated {
            if now.saturating_duration_since(last) < self.throttle {
                return None;
            }
        }

        self.last_evaluated = Some(now);
        update_current_page(state, viewport, elements)
    }

    /// Final evaluation once scrolling settles; never throttled.
    pub fn on_scroll_end(
        &mut self,
        state: &mut ViewportState,
        viewport: ScrollViewport,
        elements: &[PageElement],
    ) -> Option<u32> {
        self.last_evaluated = None;
        update_current_page(state, viewport, elements)
    }

    pub fn reset(&mut self) {
        self.last_evaluated = None;
    }
}

fn update_current_page(
    state: &mut ViewportState,
    viewport: ScrollViewport,
    elements: &[PageElement],
) -> Option<u32> {
    if state.view_mode != ViewMode::Continuous {
        return None;
    }

    let page = nearest_page(viewport, elements)?;
    if page == state.current_page {
        return None;
    }

    debug!(from = state.current_page, to = page, "current page changed by scrolling");
    state.current_page = page;
    Some(page)
}
