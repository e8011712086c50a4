use super::{CommandContext, EventsToPublish};
use crate::commands::{CreateContentStream, ForkContentStream, RemoveContentStream};
use crate::errors::{ContentGraphError, Result};
use crate::events::{ContentStreamWasCreated, ContentStreamWasForked, ContentStreamWasRemoved, Event};
use crate::model::ContentStreamId;
use crate::stream::ExpectedVersion;

fn require_unknown(ctx: &CommandContext<'_>, id: &ContentStreamId) -> Result<()> {
    // removed streams keep their events, so their ids stay taken
    if ctx.projections.content_streams().get(id).is_some() {
        return Err(ContentGraphError::ContentStreamAlreadyExists {
            content_stream_id: id.to_string(),
        });
    }
    Ok(())
}

pub(super) fn create(command: &CreateContentStream, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    require_unknown(ctx, &command.content_stream_id)?;
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::ContentStreamWasCreated(ContentStreamWasCreated {
            content_stream_id: command.content_stream_id.clone(),
        })],
        ExpectedVersion::NoStream,
    ))
}

pub(super) fn fork(command: &ForkContentStream, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let (_, source_version) = ctx.require_content_stream(&command.source_content_stream_id)?;
    require_unknown(ctx, &command.new_content_stream_id)?;
    Ok(EventsToPublish::on_content_stream(
        &command.new_content_stream_id,
        vec![Event::ContentStreamWasForked(ContentStreamWasForked {
            new_content_stream_id: command.new_content_stream_id.clone(),
            source_content_stream_id: command.source_content_stream_id.clone(),
            version_of_source_content_stream: source_version,
        })],
        ExpectedVersion::NoStream,
    ))
}

pub(super) fn remove(command: &RemoveContentStream, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let id = &command.content_stream_id;
    // halted streams may still be removed
    let record = ctx
        .projections
        .content_streams()
        .get(id)
        .filter(|r| !r.removed)
        .ok_or_else(|| ContentGraphError::ContentStreamDoesNotExistYet {
            content_stream_id: id.to_string(),
        })?;
    Ok(EventsToPublish::on_content_stream(
        id,
        vec![Event::ContentStreamWasRemoved(ContentStreamWasRemoved {
            content_stream_id: id.clone(),
        })],
        ExpectedVersion::Exact(record.version),
    ))
}
