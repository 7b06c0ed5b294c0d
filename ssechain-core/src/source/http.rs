use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Method, RequestBuilder};
use reqwest_eventsource::{retry::Never, Error as SseError, Event as SseEvent, EventSource as SseClient};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{EventSource, EventStream, SourceRequest};
use crate::error::{RelayError, RelayResult};
use crate::event::StreamEvent;

/// Where an operation lives on the upstream service
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
}

impl Endpoint {
    /// Params are sent as query string
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
        }
    }

    /// Params are sent as JSON body
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
        }
    }
}

/// Event source backed by an upstream SSE endpoint.
///
/// Never reconnects: a dropped connection ends the stream and it is up to the
/// relay to turn that into a terminal error.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    routes: HashMap<String, Endpoint>,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            routes: HashMap::new(),
        }
    }

    /// Map an operation name to an upstream endpoint
    pub fn route(mut self, operation: impl Into<String>, endpoint: Endpoint) -> Self {
        self.routes.insert(operation.into(), endpoint);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, endpoint: &Endpoint, params: &Value) -> RelayResult<RequestBuilder> {
        let url = format!("{}{}", self.base_url, endpoint.path);
        let builder = self.client.request(endpoint.method.clone(), url);

        if endpoint.method == Method::GET {
            Ok(builder.query(&query_pairs(params)?))
        } else {
            Ok(builder.json(params))
        }
    }
}

#[async_trait]
impl EventSource for HttpSource {
    async fn open(&self, request: SourceRequest) -> RelayResult<EventStream> {
        let endpoint = self
            .routes
            .get(&request.operation)
            .ok_or_else(|| RelayError::UnknownOperation(request.operation.clone()))?;

        let builder = self.build_request(endpoint, &request.params)?;
        let mut client = SseClient::new(builder)
            .map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
        client.set_retry_policy(Box::new(Never));

        let target = format!("{} {}{}", endpoint.method, self.base_url, endpoint.path);
        info!("Opening upstream stream: {}", target);

        let stream = async_stream::stream! {
            while let Some(item) = client.next().await {
                match item {
                    Ok(SseEvent::Open) => {
                        debug!("Connected to upstream {}", target);
                    }
                    Ok(SseEvent::Message(message)) => {
                        debug!("Received upstream event '{}' id={}", message.event, message.id);
                        yield decode_message(&message.event, &message.data);
                    }
                    Err(SseError::StreamEnded) => {
                        debug!("Upstream {} ended the stream", target);
                        break;
                    }
                    Err(SseError::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();
                        warn!("Upstream {} answered {}: {}", target, status, body);
                        yield Err(RelayError::UpstreamStatus {
                            status: status.as_u16(),
                            body,
                        });
                        break;
                    }
                    Err(SseError::Transport(e)) => {
                        warn!("Cannot reach upstream {}: {}", target, e);
                        yield Err(RelayError::UpstreamUnavailable(e.to_string()));
                        break;
                    }
                    Err(e) => {
                        warn!("Upstream {} stream error: {}", target, e);
                        yield Err(RelayError::UpstreamUnavailable(e.to_string()));
                        break;
                    }
                }
            }
            client.close();
        };

        Ok(Box::pin(stream))
    }
}

/// Decode one SSE message into an event. The `event:` name, when present,
/// must agree with the decoded kind.
fn decode_message(event_name: &str, data: &str) -> RelayResult<StreamEvent> {
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| RelayError::MalformedEvent(format!("{}: {}", e, preview(data))))?;

    if event_name != "message" && event_name != event.kind.as_str() {
        return Err(RelayError::MalformedEvent(format!(
            "event name '{}' does not match kind '{}'",
            event_name, event.kind
        )));
    }

    Ok(event)
}

fn preview(data: &str) -> &str {
    match data.char_indices().nth(50) {
        Some((idx, _)) => &data[..idx],
        None => data,
    }
}

fn query_pairs(params: &Value) -> RelayResult<Vec<(String, String)>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()),
        other => Err(RelayError::InvalidRequest(format!(
            "query parameters must be an object, got {}",
            other
        ))),
    }
}
