use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{RelayError, RelayResult};
use crate::event::{EventKind, StreamEvent, Terminal};
use crate::source::EventStream;

type Handler = Box<dyn FnMut(&StreamEvent) + Send>;

/// Per-kind callbacks used by [`consume`]
#[derive(Default)]
pub struct Handlers {
    by_kind: HashMap<EventKind, Handler>,
    fallback: Option<Handler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for one kind, replacing any previous one
    pub fn on<F>(mut self, kind: impl Into<EventKind>, handler: F) -> Self
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.by_kind.insert(kind.into(), Box::new(handler));
        self
    }

    /// Callback for kinds without a dedicated handler
    pub fn on_unknown<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    fn dispatch(&mut self, event: &StreamEvent) {
        if let Some(handler) = self.by_kind.get_mut(&event.kind) {
            handler(event);
        } else if let Some(fallback) = self.fallback.as_mut() {
            fallback(event);
        } else {
            debug!("No handler for '{}' event #{}, ignoring", event.kind, event.seq);
        }
    }
}

/// What a finished [`consume`] call observed
#[derive(Debug, Clone)]
pub struct ConsumeSummary {
    /// Events dispatched, terminal included
    pub delivered: usize,
    pub terminal: StreamEvent,
}

impl ConsumeSummary {
    pub fn outcome(&self) -> Terminal {
        self.terminal.terminal().unwrap_or(Terminal::Failure)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome() == Terminal::Success
    }
}

/// Drain `stream` in order, handing each event to the matching handler, and
/// stop right after the terminal event.
pub async fn consume(mut stream: EventStream, handlers: &mut Handlers) -> RelayResult<ConsumeSummary> {
    let mut delivered = 0;

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(event) => event,
            Err(RelayError::MalformedEvent(reason)) => {
                warn!("Skipping malformed event: {}", reason);
                continue;
            }
            Err(e) => return Err(e),
        };

        handlers.dispatch(&event);
        delivered += 1;

        if event.is_terminal() {
            return Ok(ConsumeSummary {
                delivered,
                terminal: event,
            });
        }
    }

    Err(RelayError::UpstreamClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{relay, RelayConfig};
    use futures::stream;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    fn recorder() -> (Arc<Mutex<Vec<(String, u64)>>>, impl Fn(&'static str) -> Box<dyn FnMut(&StreamEvent) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = log.clone();
        let make = move |tag: &'static str| {
            let log = shared.clone();
            Box::new(move |event: &StreamEvent| {
                log.lock().unwrap().push((tag.to_string(), event.seq));
            }) as Box<dyn FnMut(&StreamEvent) + Send>
        };
        (log, make)
    }

    #[tokio::test]
    async fn progress_then_result() {
        let mut items: Vec<RelayResult<StreamEvent>> = [10, 30, 50, 70, 90]
            .iter()
            .enumerate()
            .map(|(i, pct)| Ok(StreamEvent::new(EventKind::Progress, i as u64, json!({ "percent": pct }))))
            .collect();
        items.push(Ok(StreamEvent::new(EventKind::Result, 5, json!({ "properties": [{ "id": "1" }] }))));

        let percents = Arc::new(Mutex::new(Vec::new()));
        let seen = percents.clone();
        let results = Arc::new(Mutex::new(0));
        let result_count = results.clone();

        let mut handlers = Handlers::new()
            .on(EventKind::Progress, move |e: &StreamEvent| {
                seen.lock().unwrap().push(e.payload["percent"].as_u64().unwrap());
            })
            .on(EventKind::Result, move |_: &StreamEvent| {
                *result_count.lock().unwrap() += 1;
            });

        let upstream: EventStream = Box::pin(stream::iter(items));
        let summary = consume(relay(upstream, RelayConfig::default(), "scenario"), &mut handlers)
            .await
            .unwrap();

        assert_eq!(summary.delivered, 6);
        assert!(summary.succeeded());
        assert_eq!(summary.terminal.kind, EventKind::Result);
        let percents = percents.lock().unwrap().clone();
        assert_eq!(percents, vec![10, 30, 50, 70, 90]);
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*results.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_kinds_are_not_fatal() {
        let (log, make) = recorder();
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Ok(StreamEvent::new("heartbeat", 0, json!({}))),
            Ok(StreamEvent::new(EventKind::Token, 1, json!({}))),
            Ok(StreamEvent::new(EventKind::Done, 2, json!({}))),
        ];
        let mut handlers = Handlers::new().on(EventKind::Token, make("token"));
        let summary = consume(Box::pin(stream::iter(items)), &mut handlers).await.unwrap();

        assert_eq!(summary.delivered, 3);
        assert_eq!(*log.lock().unwrap(), vec![("token".to_string(), 1)]);
    }

    #[tokio::test]
    async fn fallback_sees_unhandled_kinds() {
        let (log, make) = recorder();
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Ok(StreamEvent::new("heartbeat", 0, json!({}))),
            Ok(StreamEvent::new(EventKind::Error, 1, json!({ "error": "boom" }))),
        ];
        let mut handlers = Handlers::new().on_unknown(make("other"));
        let summary = consume(Box::pin(stream::iter(items)), &mut handlers).await.unwrap();

        assert!(!summary.succeeded());
        assert_eq!(summary.terminal.error_message(), Some("boom"));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stops_at_terminal_without_draining() {
        let (log, make) = recorder();
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Ok(StreamEvent::new(EventKind::Done, 0, json!({}))),
            Ok(StreamEvent::new(EventKind::Token, 1, json!({}))),
        ];
        let mut handlers = Handlers::new().on(EventKind::Token, make("token"));
        let summary = consume(Box::pin(stream::iter(items)), &mut handlers).await.unwrap();

        assert_eq!(summary.delivered, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_without_terminal_is_an_error() {
        let items: Vec<RelayResult<StreamEvent>> = vec![Ok(StreamEvent::new(EventKind::Token, 0, json!({})))];
        let result = consume(Box::pin(stream::iter(items)), &mut Handlers::new()).await;
        assert!(matches!(result, Err(RelayError::UpstreamClosed)));
    }

    #[tokio::test]
    async fn first_callback_fires_before_source_finishes() {
        let (tx, rx) = mpsc::channel::<RelayResult<StreamEvent>>(4);
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();

        let mut handlers = Handlers::new().on(EventKind::Progress, move |e: &StreamEvent| {
            let _ = first_tx.send(e.seq);
        });
        let consumer = tokio::spawn(async move {
            let upstream: EventStream = Box::pin(ReceiverStream::new(rx));
            consume(relay(upstream, RelayConfig::default(), "latency"), &mut handlers).await
        });

        tx.send(Ok(StreamEvent::new(EventKind::Progress, 0, json!({ "percent": 10 }))))
            .await
            .unwrap();
        // the source is still "working": the next event is not sent yet
        let seen = tokio::time::timeout(Duration::from_millis(500), first_rx.recv())
            .await
            .expect("first callback should fire while the source is still busy");
        assert_eq!(seen, Some(0));

        tx.send(Ok(StreamEvent::new(EventKind::Done, 1, json!({})))).await.unwrap();
        let summary = consumer.await.unwrap().unwrap();
        assert_eq!(summary.delivered, 2);
    }
}
