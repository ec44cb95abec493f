use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Tolerance applied to percentage bounds checks on normalized rectangles.
pub const RECT_EPSILON: f64 = 1e-6;

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFFF00";

pub const HIGHLIGHT_PALETTE: [&str; 5] = ["#ffeb3b", "#a5d6a7", "#90caf9", "#f48fb1", "#ffcc80"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unsupported language code '{0}'")]
    UnknownLanguage(String),
    #[error("invalid highlight color '{0}'")]
    InvalidColor(String),
    #[error("page numbers are 1-based, got {0}")]
    InvalidPage(u32),
    #[error("a highlight needs at least one rectangle")]
    NoRects,
    #[error("rectangle {index} lies outside its page box")]
    RectOutOfBounds { index: usize },
    #[error("invalid viewer config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(pub String);

impl PaperId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub String);

impl HighlightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HighlightId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// An open document. The paper id doubles as the tab identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: PaperId,
    pub title: String,
    pub source_path: PathBuf,
}

impl Tab {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self { id: PaperId::new(id), title: title.into(), source_path: source_path.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Continuous,
    SinglePage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    #[default]
    None,
    Width,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub current_page: u32,
    /// Zero until the renderer reports the document.
    pub page_count: u32,
    pub scale: f64,
    pub fit_mode: FitMode,
    pub view_mode: ViewMode,
    /// Intrinsic width of the first reported page, captured once.
    pub page_width: Option<f64>,
}

impl ViewportState {
    pub fn new(view_mode: ViewMode) -> Self {
        Self {
            current_page: 1,
            page_count: 0,
            scale: 1.0,
            fit_mode: FitMode::None,
            view_mode,
            page_width: None,
        }
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(ViewMode::default())
    }
}

/// Opaque renderable reference produced by the asset resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHandle {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetState {
    Loading { generation: u64 },
    Ready(AssetHandle),
    Failed { path: PathBuf, message: String },
}

impl AssetState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn handle(&self) -> Option<&AssetHandle> {
        match self {
            Self::Ready(handle) => Some(handle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in absolute viewport coordinates. Page boxes use the same type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self { top, left, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    pub fn intersect(&self, other: &ViewportRect) -> Option<ViewportRect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(ViewportRect::new(top, left, right - left, bottom - top))
    }
}

/// Rectangle in percentages of a page's rendered box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn is_within_bounds(&self) -> bool {
        self.top >= -RECT_EPSILON
            && self.left >= -RECT_EPSILON
            && self.width >= 0.0
            && self.height >= 0.0
            && self.top + self.height <= 100.0 + RECT_EPSILON
            && self.left + self.width <= 100.0 + RECT_EPSILON
    }
}

pub fn is_valid_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };

    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: HighlightId,
    pub paper_id: PaperId,
    pub page_number: u32,
    pub rects: Vec<NormalizedRect>,
    pub selected_text: String,
    pub color: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Highlight {
    pub fn apply_patch(&mut self, patch: &HighlightPatch) {
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlightInput {
    pub paper_id: PaperId,
    pub page_number: u32,
    pub rects: Vec<NormalizedRect>,
    pub selected_text: String,
    pub color: Option<String>,
    pub note: Option<String>,
}

impl CreateHighlightInput {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.page_number == 0 {
            return Err(ModelError::InvalidPage(self.page_number));
        }
        if self.rects.is_empty() {
            return Err(ModelError::NoRects);
        }
        if let Some(index) = self.rects.iter().position(|rect| !rect.is_within_bounds()) {
            return Err(ModelError::RectOutOfBounds { index });
        }
        match &self.color {
            Some(color) if !is_valid_color(color) => Err(ModelError::InvalidColor(color.clone())),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightPatch {
    pub color: Option<String>,
    pub note: Option<String>,
}

impl HighlightPatch {
    pub fn validate(&self) -> Result<(), ModelError> {
        match &self.color {
            Some(color) if !is_valid_color(color) => Err(ModelError::InvalidColor(color.clone())),
            _ => Ok(()),
        }
    }
}

/// A captured but unconfirmed candidate highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub paper_id: PaperId,
    pub page_number: u32,
    pub rects: Vec<NormalizedRect>,
    pub text: String,
    pub anchor: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenuState {
    pub paper_id: PaperId,
    pub anchor: Point,
    pub selected_text: String,
    pub page_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiKind {
    Summary,
    Translation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLang {
    #[default]
    Ko,
    En,
}

impl TargetLang {
    pub fn code(self) -> &'static str {
        match self {
            Self::Ko => "ko",
            Self::En => "en",
        }
    }

    /// Lenient lookup: unknown codes translate to English.
    pub fn from_code(code: &str) -> Self {
        code.parse().unwrap_or(Self::En)
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Ko => Self::En,
            Self::En => Self::Ko,
        }
    }
}

impl FromStr for TargetLang {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ko" => Ok(Self::Ko),
            "en" => Ok(Self::En),
            other => Err(ModelError::UnknownLanguage(other.to_owned())),
        }
    }
}

impl fmt::Display for TargetLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiPopupState {
    pub paper_id: PaperId,
    pub anchor: Point,
    pub kind: AiKind,
    pub original_text: String,
    pub result: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Only set for translation popups.
    pub target_lang: Option<TargetLang>,
    pub request_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationFailurePolicy {
    /// Leave the optimistic cache change in place and report the error.
    #[default]
    KeepOptimistic,
    /// Restore the cached highlight to its pre-mutation value.
    Revert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    pub zoom_step: f64,
    pub fit_padding: f64,
    pub default_color: String,
    pub default_target_lang: TargetLang,
    pub default_view_mode: ViewMode,
    pub scroll_throttle_ms: u64,
    pub mutation_failure: MutationFailurePolicy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.5,
            max_scale: 3.0,
            zoom_step: 0.25,
            fit_padding: 48.0,
            default_color: DEFAULT_HIGHLIGHT_COLOR.to_owned(),
            default_target_lang: TargetLang::Ko,
            default_view_mode: ViewMode::Continuous,
            scroll_throttle_ms: 16,
            mutation_failure: MutationFailurePolicy::KeepOptimistic,
        }
    }
}

impl ViewerConfig {
    /// Rejects values the zoom and fit math cannot work with. Hand-edited
    /// config files reach the viewer through this check.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |message: String| Err(ModelError::InvalidConfig(message));

        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            return invalid(format!("min_scale must be positive, got {}", self.min_scale));
        }
        if !self.max_scale.is_finite() || self.max_scale < self.min_scale {
            return invalid(format!(
                "max_scale {} must not be below min_scale {}",
                self.max_scale, self.min_scale
            ));
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            return invalid(format!("zoom_step must be positive, got {}", self.zoom_step));
        }
        if !(self.fit_padding.is_finite() && self.fit_padding >= 0.0) {
            return invalid(format!("fit_padding must not be negative, got {}", self.fit_padding));
        }
        if !is_valid_color(&self.default_color) {
            return Err(ModelError::InvalidColor(self.default_color.clone()));
        }
        Ok(())
    }
}
