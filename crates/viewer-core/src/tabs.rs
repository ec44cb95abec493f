use crate::error::{AssetError, ViewerError, ViewerResult};
use crate::services::AssetResolver;
use doc_model::{AssetHandle, AssetState, PaperId, Tab, ViewMode, ViewportState};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Everything the viewer keeps for one open tab. Stored in a single map so
/// closing a tab drops all of it at once.
#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub viewport: ViewportState,
    pub asset: AssetState,
}

/// Asset resolution the host must run for a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub paper_id: PaperId,
    pub path: PathBuf,
    pub generation: u64,
}

impl AssetRequest {
    pub fn execute(&self, resolver: &dyn AssetResolver) -> Result<AssetHandle, AssetError> {
        resolver.resolve(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The document already had a tab; it is now active.
    Focused,
    Opened(AssetRequest),
    /// The document already had a tab whose asset failed to resolve; it is
    /// now active and resolution is issued again under a new generation.
    Retried(AssetRequest),
}

#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: Vec<Tab>,
    states: HashMap<PaperId, TabState>,
    active: Option<PaperId>,
    next_generation: u64,
    default_view_mode: ViewMode,
}

impl TabRegistry {
    pub fn new(default_view_mode: ViewMode) -> Self {
        Self { default_view_mode, ..Self::default() }
    }

    pub fn open_or_focus(&mut self, doc: Tab) -> OpenOutcome {
        if let Some(state) = self.states.get(&doc.id) {
            let failed = matches!(state.asset, AssetState::Failed { .. });
            self.active = Some(doc.id.clone());

            if failed {
                info!(paper = %doc.id, "re-opened a tab whose asset failed, retrying");
                if let Ok(request) = self.retry_asset(&doc.id) {
                    return OpenOutcome::Retried(request);
                }
            }

            debug!(paper = %doc.id, "document already open, focusing tab");
            return OpenOutcome::Focused;
        }

        let generation = self.bump_generation();
        let request = AssetRequest {
            paper_id: doc.id.clone(),
            path: doc.source_path.clone(),
            generation,
        };

        info!(paper = %doc.id, path = %doc.source_path.display(), "opening tab");
        self.states.insert(
            doc.id.clone(),
            TabState {
                viewport: ViewportState::new(self.default_view_mode),
                asset: AssetState::Loading { generation },
            },
        );
        self.active = Some(doc.id.clone());
        self.tabs.push(doc);

        OpenOutcome::Opened(request)
    }

    /// Applies an asset resolution result. Results for closed tabs or for a
    /// superseded request are discarded and `false` is returned.
    pub fn asset_resolved(
        &mut self,
        paper_id: &PaperId,
        generation: u64,
        result: Result<AssetHandle, AssetError>,
    ) -> bool {
        let Some(state) = self.states.get_mut(paper_id) else {
            debug!(paper = %paper_id, "asset resolved for a closed tab, discarding");
            return false;
        };

        if state.asset != (AssetState::Loading { generation }) {
            debug!(paper = %paper_id, generation, "stale asset resolution, discarding");
            return false;
        }

        state.asset = match result {
            Ok(handle) => AssetState::Ready(handle),
            Err(error) => {
                warn!(paper = %paper_id, %error, "asset resolution failed");
                let path = match &error {
                    AssetError::NotFound(path) | AssetError::Unreadable { path, .. } => {
                        path.clone()
                    }
                };
                AssetState::Failed { path, message: error.to_string() }
            }
        };
        true
    }

    /// Re-issues asset resolution after the user re-selects a tab.
    pub fn retry_asset(&mut self, paper_id: &PaperId) -> ViewerResult<AssetRequest> {
        let path = self
            .tab(paper_id)
            .map(|tab| tab.source_path.clone())
            .ok_or_else(|| ViewerError::UnknownTab(paper_id.clone()))?;

        let generation = self.bump_generation();
        if let Some(state) = self.states.get_mut(paper_id) {
            state.asset = AssetState::Loading { generation };
        }

        Ok(AssetRequest { paper_id: paper_id.clone(), path, generation })
    }

    pub fn activate(&mut self, paper_id: &PaperId) -> bool {
        if !self.states.contains_key(paper_id) {
            return false;
        }

        self.active = Some(paper_id.clone());
        true
    }

    /// Closes a tab. When it was active, the tab now at its index (or the new
    /// last tab) becomes active.
    pub fn close(&mut self, paper_id: &PaperId) -> Option<Tab> {
        let index = self.tabs.iter().position(|tab| &tab.id == paper_id)?;
        let tab = self.tabs.remove(index);
        self.states.remove(paper_id);

        if self.active.as_ref() == Some(paper_id) {
            self.active = match self.tabs.len() {
                0 => None,
                remaining => Some(self.tabs[index.min(remaining - 1)].id.clone()),
            };
        }

        info!(paper = %paper_id, remaining = self.tabs.len(), "closed tab");
        Some(tab)
    }

    pub fn move_tab(&mut self, from_index: usize, to_index: usize) -> bool {
        if from_index >= self.tabs.len() || to_index >= self.tabs.len() {
            return false;
        }

        if from_index != to_index {
            let tab = self.tabs.remove(from_index);
            self.tabs.insert(to_index, tab);
        }
        true
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, paper_id: &PaperId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| &tab.id == paper_id)
    }

    pub fn active_id(&self) -> Option<&PaperId> {
        self.active.as_ref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active.as_ref()?)
    }

    pub fn state(&self, paper_id: &PaperId) -> Option<&TabState> {
        self.states.get(paper_id)
    }

    pub fn state_mut(&mut self, paper_id: &PaperId) -> ViewerResult<&mut TabState> {
        self.states
            .get_mut(paper_id)
            .ok_or_else(|| ViewerError::UnknownTab(paper_id.clone()))
    }

    pub fn active_state_mut(&mut self) -> ViewerResult<(PaperId, &mut TabState)> {
        let active = self.active.clone().ok_or(ViewerError::NoActiveTab)?;
        let state = self.state_mut(&active)?;
        Ok((active, state))
    }

    pub fn contains(&self, paper_id: &PaperId) -> bool {
        self.states.contains_key(paper_id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}
