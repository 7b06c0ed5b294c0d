use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::event::StreamEvent;
use crate::source::EventStream;

/// Tuning for a single relayed stream
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Longest wait for the next upstream event before giving up
    pub idle_timeout: Duration,
    /// Malformed upstream events dropped before the stream is failed
    pub malformed_tolerance: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            malformed_tolerance: 3,
        }
    }
}

impl RelayConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_malformed_tolerance(mut self, malformed_tolerance: usize) -> Self {
        self.malformed_tolerance = malformed_tolerance;
        self
    }
}

/// Owns the upstream for the lifetime of the relayed stream.
/// Dropping it releases the upstream connection exactly once.
struct UpstreamGuard {
    upstream: Option<EventStream>,
    session_id: String,
    forwarded: u64,
}

impl UpstreamGuard {
    fn release(&mut self, reason: &str) {
        if self.upstream.take().is_some() {
            debug!(
                "[{}] Releasing upstream after {} events ({})",
                self.session_id, self.forwarded, reason
            );
        }
    }
}

impl Drop for UpstreamGuard {
    fn drop(&mut self) {
        if self.upstream.is_some() {
            info!(
                "[{}] Downstream went away after {} events, cancelling upstream",
                self.session_id, self.forwarded
            );
        }
        self.release("dropped");
    }
}

struct RelayState {
    guard: UpstreamGuard,
    config: RelayConfig,
    last_seq: Option<u64>,
    malformed: usize,
}

impl RelayState {
    fn next_seq(&self) -> u64 {
        self.last_seq.map(|seq| seq.saturating_add(1)).unwrap_or(0)
    }

    fn synthesize(&self, error: RelayError) -> StreamEvent {
        warn!("[{}] Upstream failed: {}", self.guard.session_id, error);
        StreamEvent::error(self.next_seq(), error.to_string(), error.code())
    }

    /// Wait for the next event worth forwarding, turning every upstream failure
    /// into a terminal error event.
    async fn next_event(&mut self) -> Option<StreamEvent> {
        let idle_timeout = self.config.idle_timeout;

        loop {
            let upstream = self.guard.upstream.as_mut()?;

            let item = match tokio::time::timeout(idle_timeout, upstream.next()).await {
                Ok(item) => item,
                Err(_) => return Some(self.synthesize(RelayError::IdleTimeout(idle_timeout))),
            };

            match item {
                Some(Ok(event)) => return Some(event),
                Some(Err(RelayError::MalformedEvent(reason))) => {
                    self.malformed += 1;
                    warn!(
                        "[{}] Dropping malformed event ({}/{}): {}",
                        self.guard.session_id, self.malformed, self.config.malformed_tolerance, reason
                    );
                    if self.malformed > self.config.malformed_tolerance {
                        return Some(self.synthesize(RelayError::MalformedEvent(format!(
                            "too many malformed events, last: {}",
                            reason
                        ))));
                    }
                }
                Some(Err(e)) => return Some(self.synthesize(e)),
                None => return Some(self.synthesize(RelayError::UpstreamClosed)),
            }
        }
    }
}

/// Re-expose `upstream` as a new stream.
///
/// Events are forwarded one at a time, in order and untouched; the upstream is
/// only polled when the downstream asks for the next event. The returned
/// stream always ends with exactly one terminal event: either the upstream's
/// own or a synthesized `error` when the upstream fails, closes early or stays
/// idle past `config.idle_timeout`. Dropping the returned stream drops the
/// upstream.
pub fn relay(upstream: EventStream, config: RelayConfig, session_id: impl Into<String>) -> EventStream {
    let state = RelayState {
        guard: UpstreamGuard {
            upstream: Some(upstream),
            session_id: session_id.into(),
            forwarded: 0,
        },
        config,
        last_seq: None,
        malformed: 0,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        let event = state.next_event().await?;

        state.last_seq = Some(event.seq);
        state.guard.forwarded += 1;
        if event.is_terminal() {
            state.guard.release("terminal event");
        }

        Some((Ok(event), state))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Terminal};
    use crate::error::RelayResult;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::Instant;
    use tokio_stream::wrappers::ReceiverStream;

    fn fast() -> RelayConfig {
        RelayConfig::default().with_idle_timeout(Duration::from_millis(100))
    }

    fn from_items(items: Vec<RelayResult<StreamEvent>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    fn tokens(words: &[&str]) -> Vec<RelayResult<StreamEvent>> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| Ok(StreamEvent::new(EventKind::Token, i as u64, json!({ "content": w }))))
            .collect()
    }

    async fn collect(stream: EventStream) -> Vec<StreamEvent> {
        stream.map(|item| item.unwrap()).collect().await
    }

    #[tokio::test]
    async fn preserves_order_for_any_length() {
        for n in 0..20u64 {
            let mut items: Vec<_> = (0..n)
                .map(|i| Ok(StreamEvent::new(EventKind::Progress, i, json!({ "percent": i }))))
                .collect();
            items.push(Ok(StreamEvent::new(EventKind::Done, n, json!({}))));

            let out = collect(relay(from_items(items), fast(), "order")).await;
            let seqs: Vec<u64> = out.iter().map(|e| e.seq).collect();
            assert_eq!(seqs, (0..=n).collect::<Vec<_>>());
            assert_eq!(out.last().unwrap().terminal(), Some(Terminal::Success));
        }
    }

    #[tokio::test]
    async fn stops_after_first_terminal() {
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Ok(StreamEvent::new(EventKind::Token, 0, json!({}))),
            Ok(StreamEvent::new(EventKind::Result, 1, json!({ "properties": [] }))),
            Ok(StreamEvent::new(EventKind::Token, 2, json!({}))),
            Ok(StreamEvent::new(EventKind::Done, 3, json!({}))),
        ];
        let out = collect(relay(from_items(items), fast(), "terminal")).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(out[1].kind, EventKind::Result);
    }

    #[tokio::test]
    async fn early_close_becomes_terminal_error() {
        let out = collect(relay(from_items(tokens(&["Hello", "there", "!"])), fast(), "close")).await;
        assert_eq!(out.len(), 4);
        let last = out.last().unwrap();
        assert_eq!(last.terminal(), Some(Terminal::Failure));
        assert_eq!(last.seq, 3);
        assert_eq!(last.payload["code"], "upstream_closed");
    }

    #[tokio::test]
    async fn empty_upstream_still_terminates() {
        let out = collect(relay(from_items(Vec::new()), fast(), "empty")).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].seq, 0);
        assert_eq!(out[0].kind, EventKind::Error);
    }

    #[tokio::test]
    async fn upstream_error_after_j_events() {
        let mut items = tokens(&["a", "b"]);
        items.push(Err(RelayError::UpstreamUnavailable("connection reset".to_string())));
        items.push(Ok(StreamEvent::new(EventKind::Token, 9, json!({}))));

        let out = collect(relay(from_items(items), fast(), "fail")).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].kind, EventKind::Error);
        assert_eq!(out[2].payload["code"], "upstream_unavailable");
        assert!(out[2].error_message().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn malformed_events_dropped_within_tolerance() {
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Ok(StreamEvent::new(EventKind::Token, 0, json!({}))),
            Err(RelayError::MalformedEvent("bad".to_string())),
            Ok(StreamEvent::new(EventKind::Token, 1, json!({}))),
            Ok(StreamEvent::new(EventKind::Done, 2, json!({}))),
        ];
        let out = collect(relay(from_items(items), fast(), "malformed")).await;
        assert_eq!(out.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(out[2].kind, EventKind::Done);
    }

    #[tokio::test]
    async fn malformed_events_past_tolerance_fail_the_stream() {
        let config = fast().with_malformed_tolerance(1);
        let items: Vec<RelayResult<StreamEvent>> = vec![
            Err(RelayError::MalformedEvent("one".to_string())),
            Err(RelayError::MalformedEvent("two".to_string())),
            Ok(StreamEvent::new(EventKind::Done, 0, json!({}))),
        ];
        let out = collect(relay(from_items(items), config, "malformed")).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload["code"], "malformed_event");
    }

    #[tokio::test]
    async fn synthesized_seq_saturates_at_max() {
        let items: Vec<RelayResult<StreamEvent>> =
            vec![Ok(StreamEvent::new(EventKind::Token, u64::MAX, json!({})))];
        let out = collect(relay(from_items(items), fast(), "saturate")).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].terminal(), Some(Terminal::Failure));
        assert_eq!(out[1].seq, u64::MAX);
        assert_eq!(out[1].payload["code"], "upstream_closed");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        // five tokens, then the upstream stays open but never speaks again
        let (tx, rx) = mpsc::channel::<RelayResult<StreamEvent>>(8);
        for item in tokens(&["Hello", "there", "!", "How", "are"]) {
            tx.send(item).await.unwrap();
        }

        let started = Instant::now();
        let out = collect(relay(Box::pin(ReceiverStream::new(rx)), fast(), "idle")).await;

        assert_eq!(out.len(), 6);
        let words: Vec<_> = out[..5].iter().map(|e| e.payload["content"].clone()).collect();
        assert_eq!(words, vec!["Hello", "there", "!", "How", "are"]);
        assert_eq!(out[5].payload["code"], "idle_timeout");
        assert_eq!(out[5].seq, 5);
        assert!(started.elapsed() >= Duration::from_millis(100));
        drop(tx);
    }

    #[tokio::test]
    async fn first_event_is_not_held_back() {
        let (tx, rx) = mpsc::channel::<RelayResult<StreamEvent>>(1);
        let mut relayed = relay(Box::pin(ReceiverStream::new(rx)), RelayConfig::default(), "eager");

        tx.send(Ok(StreamEvent::new(EventKind::Progress, 0, json!({ "percent": 10 }))))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_millis(200), relayed.next())
            .await
            .expect("first event should arrive before the source finishes")
            .unwrap()
            .unwrap();
        assert_eq!(first.seq, 0);

        tx.send(Ok(StreamEvent::new(EventKind::Done, 1, json!({})))).await.unwrap();
        let last = relayed.next().await.unwrap().unwrap();
        assert!(last.is_terminal());
        assert!(relayed.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_downstream_cancels_upstream() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let (tx, rx) = mpsc::channel::<RelayResult<StreamEvent>>(16);
        for i in 0..10u64 {
            tx.send(Ok(StreamEvent::new(EventKind::Token, i, json!({})))).await.unwrap();
        }

        let upstream = ReceiverStream::new(rx).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut relayed = relay(Box::pin(upstream), fast(), "cancel");

        for _ in 0..3 {
            relayed.next().await.unwrap().unwrap();
        }
        drop(relayed);

        tokio::time::timeout(Duration::from_millis(200), tx.closed())
            .await
            .expect("upstream should observe cancellation");
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_releases_upstream_immediately() {
        let (tx, rx) = mpsc::channel::<RelayResult<StreamEvent>>(4);
        tx.send(Ok(StreamEvent::new(EventKind::Done, 0, json!({})))).await.unwrap();

        let mut relayed = relay(Box::pin(ReceiverStream::new(rx)), fast(), "release");
        assert!(relayed.next().await.unwrap().unwrap().is_terminal());

        tokio::time::timeout(Duration::from_millis(200), tx.closed())
            .await
            .expect("upstream should be released after the terminal event");
        assert!(relayed.next().await.is_none());
    }
}
