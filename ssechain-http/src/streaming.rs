use axum::http::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{Stream, StreamExt};
use ssechain_core::{EventStream, StreamEvent};
use std::convert::Infallible;
use tracing::{debug, error};

use crate::session::Session;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Frame one event as an SSE block: `event:` carries the kind so the terminal
/// marker is visible without parsing `data:`, `id:` carries the sequence number.
pub fn to_sse_event(event: &StreamEvent) -> Event {
    let mut sse = Event::default().id(event.seq.to_string());

    let kind = event.kind.as_str();
    if !kind.contains(['\n', '\r']) {
        sse = sse.event(kind);
    }

    match serde_json::to_string(event) {
        Ok(json) => sse.data(json),
        Err(e) => {
            error!("Failed to serialize event #{}: {}", event.seq, e);
            let fallback = StreamEvent::error(event.seq, "event could not be serialized", "malformed_event");
            Event::default()
                .event("error")
                .id(event.seq.to_string())
                .data(serde_json::to_string(&fallback).unwrap_or_default())
        }
    }
}

/// Sequence number for an event synthesized after `last`
fn seq_after(last: Option<u64>) -> u64 {
    last.map(|seq| seq.saturating_add(1)).unwrap_or(0)
}

/// Turn an event stream into SSE frames for one session.
///
/// Stops after the terminal event. A source error that reaches this point is
/// framed as the terminal `error` event. Dropping the returned stream (client
/// disconnect) drops both the source stream and the session.
pub fn session_to_sse_stream(
    events: EventStream,
    session: Session,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(
        (events, session, None::<u64>, false),
        |(mut events, mut session, last_seq, done)| async move {
            if done {
                return None;
            }

            let event = match events.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!("[{}] - [{}] Source error: {}", session.request_id, session.session_id, e);
                    StreamEvent::error(seq_after(last_seq), e.to_string(), e.code())
                }
                None => {
                    debug!("[{}] - [{}] Source ended", session.request_id, session.session_id);
                    return None;
                }
            };

            let terminal = event.is_terminal();
            if terminal {
                session.finish();
                debug!(
                    "[{}] - [{}] Sending terminal '{}' event #{}",
                    session.request_id, session.session_id, event.kind, event.seq
                );
            }

            let frame = to_sse_event(&event);
            Some((Ok(frame), (events, session, Some(event.seq), terminal)))
        },
    )
}

/// Streaming response with the headers proxies need to pass events through unbuffered
pub fn sse_response(events: EventStream, session: Session) -> Response {
    let stream = session_to_sse_stream(events, session);
    (
        [(X_ACCEL_BUFFERING, "no")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
