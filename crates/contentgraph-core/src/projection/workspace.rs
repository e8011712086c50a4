//! Workspace projection

use crate::model::{ContentStreamId, WorkspaceName};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub workspace_name: WorkspaceName,
    pub base_workspace_name: Option<WorkspaceName>,
    pub current_content_stream_id: ContentStreamId,
}

impl Workspace {
    pub fn is_root(&self) -> bool {
        self.base_workspace_name.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceProjection {
    workspaces: BTreeMap<WorkspaceName, Workspace>,
}

impl WorkspaceProjection {
    pub fn get(&self, name: &WorkspaceName) -> Option<&Workspace> {
        self.workspaces.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.values()
    }

    pub fn by_content_stream(&self, id: &ContentStreamId) -> Option<&Workspace> {
        self.workspaces
            .values()
            .find(|w| &w.current_content_stream_id == id)
    }

    pub fn dependents_of(&self, base: &WorkspaceName) -> Vec<&Workspace> {
        self.workspaces
            .values()
            .filter(|w| w.base_workspace_name.as_ref() == Some(base))
            .collect()
    }

    pub(crate) fn insert(&mut self, workspace: Workspace) {
        self.workspaces
            .insert(workspace.workspace_name.clone(), workspace);
    }

    pub(crate) fn switch_content_stream(&mut self, name: &WorkspaceName, id: &ContentStreamId) {
        if let Some(workspace) = self.workspaces.get_mut(name) {
            workspace.current_content_stream_id = id.clone();
        }
    }
}
