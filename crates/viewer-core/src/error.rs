use doc_model::{HighlightId, ModelError, PaperId};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no open tab for paper {0}")]
    UnknownTab(PaperId),
    #[error("no active tab")]
    NoActiveTab,
    #[error("no highlight popup is open")]
    NoPopup,
    #[error("highlight {0} is not loaded")]
    UnknownHighlight(HighlightId),
    #[error("page {0} is not rendered")]
    PageNotRendered(u32),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("annotation store: {0}")]
    Store(#[from] StoreError),
}

pub type ViewerResult<T> = Result<T, ViewerError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("highlight not found: {0}")]
    NotFound(HighlightId),
    #[error("invalid highlight: {0}")]
    Invalid(#[from] ModelError),
    #[error("{0}")]
    Backend(String),
}

/// Failures of the summarize/translate collaborator. Display text is shown to the user.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AiError {
    #[error("no Gemini API key is configured")]
    MissingApiKey,
    #[error("there is no text to process")]
    EmptyInput,
    #[error("AI request failed: {0}")]
    Network(String),
    #[error("AI service error: {0}")]
    Api(String),
    #[error("unexpected AI response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot open {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}
