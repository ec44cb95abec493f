//! Conversion between viewport rectangles and page-relative percentages.
//!
//! A highlight is stored as percentages of the page box it was captured on.
//! At render time the same percentages are expanded against whatever box the
//! page currently occupies, so zoom and container resizes never require the
//! stored rectangles to be recomputed.

use doc_model::{NormalizedRect, Point, ViewportRect};

/// Normalizes `rect` against `page_box`.
///
/// The rectangle is clipped to the page first so the result always satisfies
/// the percentage bounds. Returns `None` for a degenerate page box or when
/// nothing of the rectangle lies on the page.
pub fn normalize_rect(rect: &ViewportRect, page_box: &ViewportRect) -> Option<NormalizedRect> {
    if page_box.is_empty() {
        return None;
    }

    let clipped = page_box.intersect(rect)?;

    Some(NormalizedRect {
        top: (clipped.top - page_box.top) / page_box.height * 100.0,
        left: (clipped.left - page_box.left) / page_box.width * 100.0,
        width: clipped.width / page_box.width * 100.0,
        height: clipped.height / page_box.height * 100.0,
    })
}

pub fn expand_rect(rect: &NormalizedRect, page_box: &ViewportRect) -> ViewportRect {
    ViewportRect {
        top: page_box.top + rect.top / 100.0 * page_box.height,
        left: page_box.left + rect.left / 100.0 * page_box.width,
        width: rect.width / 100.0 * page_box.width,
        height: rect.height / 100.0 * page_box.height,
    }
}

/// Popup anchor for a rectangle: its trailing (right, bottom) corner.
pub fn trailing_anchor(rect: &ViewportRect) -> Point {
    Point::new(rect.right(), rect.bottom())
}
