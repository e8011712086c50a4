//! Shared fixtures for event store tests

use contentgraph_core::events::{ContentStreamWasCreated, Event};
use contentgraph_core::model::ContentStreamId;
use contentgraph_store::{EventStore, InMemoryEventStore, NewEvent, SqliteEventStore};

/// A stored content stream creation event
#[allow(dead_code)]
pub fn stream_created(id: &str) -> NewEvent {
    let event = Event::ContentStreamWasCreated(ContentStreamWasCreated {
        content_stream_id: ContentStreamId::new(id).unwrap(),
    });
    NewEvent::from_event(&event, serde_json::json!({ "initiatingUserId": "system" })).unwrap()
}

/// A raw event with an arbitrary payload
#[allow(dead_code)]
pub fn raw_event(event_type: &str, n: u64) -> NewEvent {
    NewEvent {
        event_id: uuid::Uuid::now_v7().to_string(),
        event_type: event_type.to_string(),
        payload: serde_json::json!({ "n": n }),
        metadata: serde_json::json!({}),
    }
}

/// Both store implementations, labelled for assertion messages
#[allow(dead_code)]
pub fn all_stores() -> Vec<(&'static str, Box<dyn EventStore>)> {
    vec![
        ("memory", Box::new(InMemoryEventStore::new())),
        ("sqlite", Box::new(SqliteEventStore::in_memory().unwrap())),
    ]
}
