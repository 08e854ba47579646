//! Chat stream to server-sent events
//!
//! Text chunks go out as plain `data:` events carrying `{"text": ...}`.
//! A grounded answer is followed by one `sources` event, and every
//! successful stream ends with `done`. A failure after streaming started
//! ends the stream with an `error` event carrying `{"error": ...}` and no
//! `done`.

use crate::core::constants::message;
use crate::core::provider::{ChatStream, GroundingSource};
use crate::models::studio::{ChatDelta, ChatSources, ErrorBody, SourceLink};
use axum::response::sse::Event;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{error, info};

/// SSE event names
pub mod event {
    pub const SOURCES: &str = "sources";
    pub const ERROR: &str = "error";
    pub const DONE: &str = "done";
}

/// Data of the final `done` event
pub const DONE_MARKER: &str = "[DONE]";

fn json_event<T: Serialize>(name: Option<&str>, payload: &T) -> Event {
    let event = match name {
        Some(name) => Event::default().event(name),
        None => Event::default(),
    };
    match event.json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            error!("Failed to encode chat event: {}", e);
            Event::default()
                .event(event::ERROR)
                .data(format!("{{\"error\":\"{}\"}}", message::UNEXPECTED))
        }
    }
}

/// Relay provider chunks to the client as SSE events
pub fn chat_events(chunks: ChatStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut chunks = chunks;
        let mut sources: Vec<GroundingSource> = Vec::new();
        let mut sent = 0usize;
        let mut failed = false;

        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    for source in chunk.sources {
                        if !sources.contains(&source) {
                            sources.push(source);
                        }
                    }
                    if !chunk.text.is_empty() {
                        sent += 1;
                        yield Ok(json_event(None, &ChatDelta { text: chunk.text }));
                    }
                }
                Err(e) => {
                    error!("Chat stream failed after {} chunks: {}", sent, e);
                    let body = ErrorBody {
                        error: format!("{}: {}", message::CHAT_FAILED, e),
                    };
                    yield Ok(json_event(Some(event::ERROR), &body));
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            if !sources.is_empty() {
                let payload = ChatSources {
                    sources: sources
                        .into_iter()
                        .map(|s| SourceLink { uri: s.uri, title: s.title })
                        .collect(),
                };
                yield Ok(json_event(Some(event::SOURCES), &payload));
            }
            info!("Chat stream completed with {} chunks", sent);
            yield Ok(Event::default().event(event::DONE).data(DONE_MARKER));
        }
    }
}
