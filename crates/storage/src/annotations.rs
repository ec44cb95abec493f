use crate::{read_envelope, write_envelope, StorageError};
use chrono::Utc;
use doc_model::{
    CreateHighlightInput, Highlight, HighlightId, HighlightPatch, PaperId, DEFAULT_HIGHLIGHT_COLOR,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use viewer_core::{AnnotationStore, StoreError};

/// Highlights of every paper in one JSON file, rewritten on each mutation.
#[derive(Debug)]
pub struct JsonAnnotationStore {
    path: PathBuf,
    highlights: Vec<Highlight>,
}

impl JsonAnnotationStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let highlights: Vec<Highlight> = read_envelope(&path)?.unwrap_or_default();
        debug!(path = %path.display(), count = highlights.len(), "opened highlight store");

        Ok(Self { path, highlights })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &HighlightId) -> Option<&Highlight> {
        self.highlights.iter().find(|h| &h.id == id)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let root = self.path.parent().unwrap_or_else(|| Path::new("."));
        write_envelope(root, &self.path, &self.highlights)
            .map_err(|error| StoreError::Backend(error.to_string()))
    }

    fn position(&self, id: &HighlightId) -> Result<usize, StoreError> {
        self.highlights
            .iter()
            .position(|h| &h.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

impl AnnotationStore for JsonAnnotationStore {
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

        found.sort_by(|a, b| {
            a.page_number.cmp(&b.page_number).then(a.created_at.cmp(&b.created_at))
        });
        Ok(found)
    }

    fn create(&mut self, input: CreateHighlightInput) -> Result<Highlight, StoreError> {
        input.validate()?;

        let now = Utc::now();
        let highlight = Highlight {
            id: HighlightId::new(Uuid::new_v4().to_string()),
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
        if let Err(error) = self.persist() {
            self.highlights.pop();
            return Err(error);
        }

        info!(
            id = %highlight.id,
            paper = %highlight.paper_id,
            page = highlight.page_number,
            "stored highlight"
        );
        Ok(highlight)
    }

    fn update(&mut self, id: &HighlightId, patch: HighlightPatch) -> Result<Highlight, StoreError> {
        patch.validate()?;

        let index = self.position(id)?;
        let previous = self.highlights[index].clone();

        let highlight = &mut self.highlights[index];
        highlight.apply_patch(&patch);
        highlight.updated_at = Utc::now();
        let updated = highlight.clone();

        if let Err(error) = self.persist() {
            self.highlights[index] = previous;
            return Err(error);
        }

        info!(%id, "updated highlight");
        Ok(updated)
    }

    fn delete(&mut self, id: &HighlightId) -> Result<(), StoreError> {
        let index = self.position(id)?;
        let removed = self.highlights.remove(index);

        if let Err(error) = self.persist() {
            self.highlights.insert(index, removed);
            return Err(error);
        }

        info!(%id, "deleted highlight");
        Ok(())
    }
}
