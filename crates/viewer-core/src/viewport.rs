use doc_model::{FitMode, ViewMode, ViewerConfig, ViewportState};
use tracing::warn;

/// What the host must do to show a page after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNavigation {
    /// Continuous mode: scroll the page element into view.
    ScrollIntoView(u32),
    /// Single-page mode: render this page in place of the current one.
    SwapPage(u32),
}

impl PageNavigation {
    pub fn page(self) -> u32 {
        match self {
            Self::ScrollIntoView(page) | Self::SwapPage(page) => page,
        }
    }
}

/// Zoom, fit and page rules applied to a tab's `ViewportState`.
///
/// The controller owns only viewer-wide values (limits and the container
/// width); everything per tab lives in the state passed in.
#[derive(Debug, Clone)]
pub struct ViewportController {
    min_scale: f64,
    max_scale: f64,
    zoom_step: f64,
    fit_padding: f64,
    container_width: f64,
}

impl ViewportController {
    /// A config that fails validation falls back to the default zoom limits,
    /// so `clamp` always sees an ordered, finite range.
    pub fn new(config: &ViewerConfig) -> Self {
        let defaults = ViewerConfig::default();
        let config = match config.validate() {
            Ok(()) => config,
            Err(error) => {
                warn!(%error, "ignoring viewer config, using default zoom limits");
                &defaults
            }
        };

        Self {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            zoom_step: config.zoom_step,
            fit_padding: config.fit_padding,
            container_width: 0.0,
        }
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    pub fn set_container_width(&mut self, width: f64) {
        self.container_width = width.max(0.0);
    }

    /// Manual zoom. Always leaves fit-to-width.
    pub fn change_scale(&self, state: &mut ViewportState, delta: f64) -> f64 {
        state.scale = (state.scale + delta).clamp(self.min_scale, self.max_scale);
        state.fit_mode = FitMode::None;
        state.scale
    }

    pub fn zoom_in(&self, state: &mut ViewportState) -> f64 {
        self.change_scale(state, self.zoom_step)
    }

    pub fn zoom_out(&self, state: &mut ViewportState) -> f64 {
        self.change_scale(state, -self.zoom_step)
    }

    pub fn reset_zoom(&self, state: &mut ViewportState) {
        state.scale = 1.0_f64.clamp(self.min_scale, self.max_scale);
        state.fit_mode = FitMode::None;
    }

    pub fn toggle_fit_width(&self, state: &mut ViewportState) -> FitMode {
        state.fit_mode = match state.fit_mode {
            FitMode::None => FitMode::Width,
            FitMode::Width => FitMode::None,
        };
        state.fit_mode
    }

    /// Scale the page is rendered at. In fit-to-width mode this depends only
    /// on the container and page widths, never on the stored manual scale,
    /// and stays within the zoom limits however narrow the container gets.
    pub fn effective_scale(&self, state: &ViewportState) -> f64 {
        match (state.fit_mode, state.page_width) {
            (FitMode::Width, Some(page_width))
                if self.container_width > 0.0 && page_width > 0.0 =>
            {
                let available = (self.container_width - self.fit_padding).max(0.0);
                (available / page_width).clamp(self.min_scale, self.max_scale)
            }
            _ => state.scale,
        }
    }

    /// Records the intrinsic page width once; later reports are ignored.
    pub fn capture_page_width(&self, state: &mut ViewportState, width: f64) -> bool {
        if state.page_width.is_some() || width <= 0.0 {
            return false;
        }

        state.page_width = Some(width);
        true
    }

    pub fn document_loaded(&self, state: &mut ViewportState, page_count: u32) {
        state.page_count = page_count;
        state.current_page = clamp_page(state.current_page, page_count);
    }

    pub fn go_to_page(&self, state: &mut ViewportState, page: u32) -> PageNavigation {
        state.current_page = clamp_page(page, state.page_count);
        navigation_for(state)
    }

    pub fn next_page(&self, state: &mut ViewportState) -> PageNavigation {
        let target = state.current_page.saturating_add(1);
        self.go_to_page(state, target)
    }

    pub fn previous_page(&self, state: &mut ViewportState) -> PageNavigation {
        let target = state.current_page.saturating_sub(1);
        self.go_to_page(state, target)
    }

    /// Switches layout and returns how to show the page that was current.
    pub fn set_view_mode(&self, state: &mut ViewportState, mode: ViewMode) -> PageNavigation {
        state.view_mode = mode;
        navigation_for(state)
    }
}

fn clamp_page(page: u32, page_count: u32) -> u32 {
    page.clamp(1, page_count.max(1))
}

fn navigation_for(state: &ViewportState) -> PageNavigation {
    match state.view_mode {
        ViewMode::Continuous => PageNavigation::ScrollIntoView(state.current_page),
        ViewMode::SinglePage => PageNavigation::SwapPage(state.current_page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ViewportController {
        ViewportController::new(&ViewerConfig::default())
    }

    #[test]
    fn manual_zoom_clamps_and_leaves_fit_mode() {
        let controller = controller();
        let mut state = ViewportState { fit_mode: FitMode::Width, ..ViewportState::default() };

        controller.change_scale(&mut state, 0.25);
        assert_eq!(state.fit_mode, FitMode::None);
        assert_eq!(state.scale, 1.25);

        controller.change_scale(&mut state, 10.0);
        assert_eq!(state.scale, 3.0);

        controller.change_scale(&mut state, -10.0);
        assert_eq!(state.scale, 0.5);
    }

    #[test]
    fn six_quarter_steps_from_one_reach_two_and_a_half_then_fit_width_ignores_it() {
        let mut controller = controller();
        let mut state = ViewportState::default();

        for _ in 0..6 {
            controller.zoom_in(&mut state);
        }
        assert_eq!(state.scale, 2.5);
        assert_eq!(state.fit_mode, FitMode::None);

        controller.set_container_width(900.0);
        controller.capture_page_width(&mut state, 600.0);
        controller.toggle_fit_width(&mut state);

        let effective = controller.effective_scale(&state);
        assert!((effective - 1.42).abs() < 1e-9, "effective scale was {effective}");

        // Same answer no matter what manual scale was stored before.
        state.scale = 0.5;
        assert!((controller.effective_scale(&state) - 1.42).abs() < 1e-9);
    }

    #[test]
    fn fit_width_falls_back_to_manual_scale_without_geometry() {
        let mut controller = controller();
        let mut state =
            ViewportState { scale: 1.75, fit_mode: FitMode::Width, ..ViewportState::default() };

        controller.set_container_width(1200.0);
        assert_eq!(controller.effective_scale(&state), 1.75);

        controller.capture_page_width(&mut state, 600.0);
        controller.set_container_width(0.0);
        assert_eq!(controller.effective_scale(&state), 1.75);
    }

    #[test]
    fn fit_width_is_capped_at_max_scale() {
        let mut controller = controller();
        let mut state = ViewportState::default();
        controller.set_container_width(5000.0);
        controller.capture_page_width(&mut state, 300.0);
        controller.toggle_fit_width(&mut state);

        assert_eq!(controller.effective_scale(&state), 3.0);
    }

    #[test]
    fn fit_width_in_a_container_narrower_than_padding_uses_min_scale() {
        let mut controller = controller();
        let mut state = ViewportState::default();
        controller.capture_page_width(&mut state, 600.0);
        controller.toggle_fit_width(&mut state);

        controller.set_container_width(40.0);
        assert_eq!(controller.effective_scale(&state), 0.5);

        controller.set_container_width(48.0);
        assert_eq!(controller.effective_scale(&state), 0.5);

        controller.set_container_width(150.0);
        assert_eq!(controller.effective_scale(&state), 0.5);
    }

    #[test]
    fn inverted_zoom_limits_fall_back_to_defaults() {
        let config = ViewerConfig { min_scale: 2.0, max_scale: 1.0, ..ViewerConfig::default() };
        let controller = ViewportController::new(&config);
        let mut state = ViewportState::default();

        assert_eq!(controller.change_scale(&mut state, 0.25), 1.25);
        controller.reset_zoom(&mut state);
        assert_eq!(state.scale, 1.0);
        assert_eq!(controller.change_scale(&mut state, 10.0), 3.0);
    }

    #[test]
    fn nan_zoom_limit_does_not_reach_clamp() {
        let config = ViewerConfig { max_scale: f64::NAN, ..ViewerConfig::default() };
        let controller = ViewportController::new(&config);
        let mut state = ViewportState::default();

        assert_eq!(controller.zoom_out(&mut state), 0.75);
    }

    #[test]
    fn page_width_is_captured_once() {
        let controller = controller();
        let mut state = ViewportState::default();

        assert!(controller.capture_page_width(&mut state, 612.0));
        assert!(!controller.capture_page_width(&mut state, 842.0));
        assert_eq!(state.page_width, Some(612.0));
    }

    #[test]
    fn navigation_is_clamped_and_depends_on_view_mode() {
        let controller = controller();
        let mut state = ViewportState::default();
        controller.document_loaded(&mut state, 12);

        assert_eq!(controller.go_to_page(&mut state, 40), PageNavigation::ScrollIntoView(12));
        assert_eq!(controller.go_to_page(&mut state, 0), PageNavigation::ScrollIntoView(1));
        assert_eq!(controller.previous_page(&mut state), PageNavigation::ScrollIntoView(1));

        controller.set_view_mode(&mut state, ViewMode::SinglePage);
        assert_eq!(controller.go_to_page(&mut state, 7), PageNavigation::SwapPage(7));
        assert_eq!(controller.next_page(&mut state), PageNavigation::SwapPage(8));
        assert_eq!(
            controller.set_view_mode(&mut state, ViewMode::Continuous),
            PageNavigation::ScrollIntoView(8)
        );
    }

    #[test]
    fn reloading_a_shorter_document_clamps_current_page() {
        let controller = controller();
        let mut state = ViewportState { current_page: 9, ..ViewportState::default() };

        controller.document_loaded(&mut state, 4);
        assert_eq!(state.current_page, 4);
    }
}
