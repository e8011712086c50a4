//! Content stream projection: existence, lineage, version and state

use crate::model::ContentStreamId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStreamState {
    Created,
    Forked,
    InUseByWorkspace,
    NoLongerInUse,
    RebaseError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStreamRecord {
    pub content_stream_id: ContentStreamId,
    pub source_content_stream_id: Option<ContentStreamId>,
    pub source_content_stream_version: Option<u64>,
    /// Version of the last event in the stream
    pub version: u64,
    pub state: ContentStreamState,
    pub removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentStreamProjection {
    records: BTreeMap<ContentStreamId, ContentStreamRecord>,
}

impl ContentStreamProjection {
    pub fn get(&self, id: &ContentStreamId) -> Option<&ContentStreamRecord> {
        self.records.get(id)
    }

    /// Known and not removed
    pub fn is_active(&self, id: &ContentStreamId) -> bool {
        self.get(id).map(|r| !r.removed).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentStreamRecord> {
        self.records.values()
    }

    /// Streams forked (directly) from `id`
    pub fn forks_of(&self, id: &ContentStreamId) -> Vec<&ContentStreamRecord> {
        self.records
            .values()
            .filter(|r| r.source_content_stream_id.as_ref() == Some(id))
            .collect()
    }

    pub(crate) fn created(&mut self, id: &ContentStreamId, version: u64) {
        self.records.insert(
            id.clone(),
            ContentStreamRecord {
                content_stream_id: id.clone(),
                source_content_stream_id: None,
                source_content_stream_version: None,
                version,
                state: ContentStreamState::Created,
                removed: false,
            },
        );
    }

    pub(crate) fn forked(&mut self, id: &ContentStreamId, source: &ContentStreamId, source_version: u64, version: u64) {
        self.records.insert(
            id.clone(),
            ContentStreamRecord {
                content_stream_id: id.clone(),
                source_content_stream_id: Some(source.clone()),
                source_content_stream_version: Some(source_version),
                version,
                state: ContentStreamState::Forked,
                removed: false,
            },
        );
    }

    pub(crate) fn advance(&mut self, id: &ContentStreamId, version: u64) {
        if let Some(record) = self.records.get_mut(id) {
            record.version = record.version.max(version);
        }
    }

    pub(crate) fn set_state(&mut self, id: &ContentStreamId, state: ContentStreamState) {
        if let Some(record) = self.records.get_mut(id) {
            record.state = state;
        }
    }

    pub(crate) fn removed(&mut self, id: &ContentStreamId) {
        if let Some(record) = self.records.get_mut(id) {
            record.removed = true;
        }
    }

    /// Drop all knowledge of a stream whose events were deleted
    pub(crate) fn forget(&mut self, id: &ContentStreamId) {
        self.records.remove(id);
    }
}
