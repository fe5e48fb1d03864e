use std::sync::Arc;

use agentdeck_wire::{FileKind, FileNode, SaveFileRequest};

use crate::error::{DeckError, Result};
use crate::language::EditorLanguage;
use crate::transport::WorkspaceBackend;

/// Asked before unsaved edits are thrown away by selecting another file.
pub trait DiscardGate {
    fn confirm_discard(&mut self, current: &FileNode, next: &FileNode) -> bool;
}

impl<F> DiscardGate for F
where
    F: FnMut(&FileNode, &FileNode) -> bool,
{
    fn confirm_discard(&mut self, current: &FileNode, next: &FileNode) -> bool {
        self(current, next)
    }
}

/// Gate for callers that already asked the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlreadyConfirmed;

impl DiscardGate for AlreadyConfirmed {
    fn confirm_discard(&mut self, _current: &FileNode, _next: &FileNode) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Loaded,
    /// Unsaved edits were kept; nothing changed.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    NothingSelected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceState {
    pub tree: Vec<FileNode>,
    pub selected: Option<FileNode>,
    pub content: String,
    pub dirty: bool,
}

/// Client-side view of the remote workspace: the tree, the open file, and
/// whether the buffer has unsaved edits.
pub struct WorkspaceManager<B: WorkspaceBackend + ?Sized> {
    backend: Arc<B>,
    state: WorkspaceState,
}

impl<B: WorkspaceBackend + ?Sized> WorkspaceManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: WorkspaceState::default(),
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn tree(&self) -> &[FileNode] {
        &self.state.tree
    }

    pub fn selected(&self) -> Option<&FileNode> {
        self.state.selected.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    pub fn language(&self) -> EditorLanguage {
        self.state
            .selected
            .as_ref()
            .map(|node| EditorLanguage::from_filename(&node.name))
            .unwrap_or_default()
    }

    /// Replaces the tree wholesale. On failure the previous tree stays.
    pub async fn refresh_tree(&mut self) -> Result<&[FileNode]> {
        match self.backend.fetch_tree().await {
            Ok(mut tree) => {
                sanitize(&mut tree);
                tracing::debug!("Fetched workspace tree ({} top-level entries)", tree.len());
                self.state.tree = tree;
                Ok(&self.state.tree)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch workspace tree: {}", e);
                Err(e)
            }
        }
    }

    pub async fn select_file<G>(&mut self, node: &FileNode, gate: &mut G) -> Result<SelectOutcome>
    where
        G: DiscardGate + ?Sized,
    {
        if node.is_dir() {
            return Err(DeckError::NotAFile(node.path.clone()));
        }
        if self.state.dirty {
            if let Some(current) = self.state.selected.as_ref() {
                if !gate.confirm_discard(current, node) {
                    tracing::debug!("Kept unsaved edits to {}", current.path);
                    return Ok(SelectOutcome::Declined);
                }
            }
        }

        let content = match self.backend.fetch_content(&node.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to fetch content of {}: {}", node.path, e);
                return Err(e);
            }
        };
        self.state.selected = Some(node.clone());
        self.state.content = content;
        self.state.dirty = false;
        Ok(SelectOutcome::Loaded)
    }

    /// Replaces the buffer. Returns false when no file is open.
    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        if self.state.selected.is_none() {
            return false;
        }
        self.state.content = content.into();
        self.state.dirty = true;
        true
    }

    pub async fn save(&mut self) -> Result<SaveOutcome> {
        let Some(selected) = self.state.selected.as_ref() else {
            return Ok(SaveOutcome::NothingSelected);
        };
        let request = SaveFileRequest {
            path: selected.path.clone(),
            content: self.state.content.clone(),
        };
        match self.backend.save_file(&request).await {
            Ok(()) => {
                tracing::info!("Saved {} ({} bytes)", request.path, request.content.len());
                self.state.dirty = false;
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                tracing::warn!("Failed to save {}: {}", request.path, e);
                Err(e)
            }
        }
    }
}

// Files never carry children and directories always do, so views can rely on
// `kind` alone.
fn sanitize(forest: &mut [FileNode]) {
    for node in forest {
        match node.kind {
            FileKind::File => {
                if node.children.take().is_some() {
                    tracing::warn!("Dropped children of file node {}", node.path);
                }
            }
            FileKind::Directory => {
                if node.children.is_none() {
                    tracing::warn!("Directory node {} arrived without children", node.path);
                }
                let children = node.children.get_or_insert_with(Vec::new);
                sanitize(children);
            }
        }
    }
}
