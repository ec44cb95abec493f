//! Collaborator interfaces the engine drives but does not implement.
//!
//! The store and resolver implementations used by the application live in the
//! `storage` crate and the AI implementation in `gemini-client`. An in-memory
//! store is provided here for hosts that keep annotations elsewhere and for tests.

use crate::error::{AiError, AssetError, StoreError};
use chrono::Utc;
use doc_model::{
    AssetHandle, CreateHighlightInput, Highlight, HighlightId, HighlightPatch, PaperId, TargetLang,
    DEFAULT_HIGHLIGHT_COLOR,
};
use std::path::Path;

/// Authoritative persistence for highlights.
pub trait AnnotationStore {
    /// Highlights of a paper ordered by page number, then creation order.
    fn list(
        &self,
        paper_id: &PaperId,
        page_number: Option<u32>,
    ) -> Result<Vec<Highlight>, StoreError>;

    fn create(&mut self, input: CreateHighlightInput) -> Result<Highlight, StoreError>;

    fn update(&mut self, id: &HighlightId, patch: HighlightPatch) -> Result<Highlight, StoreError>;

    fn delete(&mut self, id: &HighlightId) -> Result<(), StoreError>;
}

pub trait AiService {
    fn summarize(&self, text: &str) -> Result<String, AiError>;

    fn translate(&self, text: &str, target: TargetLang) -> Result<String, AiError>;
}

pub trait AssetResolver {
    fn resolve(&self, path: &Path) -> Result<AssetHandle, AssetError>;
}

/// Process-local `AnnotationStore`. Highlights live as long as the store
/// does, so hosts use it for sessions that must not write to disk (read-only
/// previews, embedding without a data directory) and as the reference
/// behaviour a persistent store is expected to match.
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    highlights: Vec<Highlight>,
    next_id: u64,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }
}

impl AnnotationStore for MemoryAnnotationStore {
    fn list(
        &self,
        paper_id: &PaperId,
        page_number: Option<u32>,
    ) -> Result<Vec<Highlight>, StoreError> {
        let mut found: Vec<Highlight> = self
            .highlights
            .iter()
            .filter(|h| &h.paper_id == paper_id)
            .filter(|h| page_number.map_or(true, |page| h.page_number == page))
            .cloned()
            .collect();

        // Stable: insertion order is creation order within a page.
        found.sort_by_key(|h| h.page_number);
        Ok(found)
    }

    fn create(&mut self, input: CreateHighlightInput) -> Result<Highlight, StoreError> {
        input.validate()?;

        self.next_id += 1;
        let now = Utc::now();
        let highlight = Highlight {
            id: HighlightId::new(format!("hl-{}", self.next_id)),
            paper_id: input.paper_id,
            page_number: input.page_number,
            rects: input.rects,
            selected_text: input.selected_text,
            color: input.color.unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_owned()),
            note: input.note.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.highlights.push(highlight.clone());
        Ok(highlight)
    }

    fn update(&mut self, id: &HighlightId, patch: HighlightPatch) -> Result<Highlight, StoreError> {
        patch.validate()?;

        let highlight = self
            .highlights
            .iter_mut()
            .find(|h| &h.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        highlight.apply_patch(&patch);
        highlight.updated_at = Utc::now();
        Ok(highlight.clone())
    }

    fn delete(&mut self, id: &HighlightId) -> Result<(), StoreError> {
        let index = self
            .highlights
            .iter()
            .position(|h| &h.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        self.highlights.remove(index);
        Ok(())
    }
}
