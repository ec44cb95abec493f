//! Paper reader engine
//!
//! Tabs, viewport and scroll tracking, selection-to-highlight capture, the
//! context menu and the AI popup, driven by a host event loop.

pub mod ai_popup;
pub mod context_menu;
pub mod error;
pub mod geometry;
pub mod highlight;
pub mod scroll;
pub mod selection;
pub mod services;
pub mod session;
pub mod tabs;
pub mod viewport;

pub use ai_popup::{
    AiPopupController, AiPopupStatus, AiRequest, Disposition, NoteDraft, RequestTicket,
};
pub use context_menu::{ContextAction, ContextMenuController, ContextOutcome};
pub use error::{AiError, AssetError, StoreError, ViewerError, ViewerResult};
pub use geometry::{expand_rect, normalize_rect, trailing_anchor};
pub use highlight::{HighlightInteraction, HighlightPopup, PopupMode, RenderedHighlight};
pub use scroll::{nearest_page, PageElement, ScrollPositionTracker, ScrollViewport};
pub use selection::{
    capture_selection, CapturedSelection, PageLayout, RecordedSelection, Selection, SelectionSource,
    StaticLayout,
};
pub use services::{AiService, AnnotationStore, AssetResolver, MemoryAnnotationStore};
pub use session::ReaderSession;
pub use tabs::{AssetRequest, OpenOutcome, TabRegistry, TabState};
pub use viewport::{PageNavigation, ViewportController};
