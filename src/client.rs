use std::collections::VecDeque;
use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::warn;

use crate::config::AgentApiConfig;
use crate::error::{parse_error_message, TurnError};
use crate::events::{decode_event, TurnEvent};
use crate::headers::{build_headers, HEADER_CONVERSATION_ID};
use crate::payload::{BatchResponse, TurnRequest};
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::sse::{SseParser, DONE_SENTINEL};
use crate::url::normalize_turns_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Dispatches a turn request and yields the resulting event feed.
///
/// The session drives this seam; swapping the implementation swaps the
/// transport without touching assembly logic.
#[async_trait]
pub trait TurnTransport: Send + Sync {
    async fn open(
        &self,
        request: &TurnRequest,
        cancellation: Option<CancellationSignal>,
    ) -> Result<Box<dyn TurnFeed>, TurnError>;
}

/// One dispatched turn's worth of normalized events, pulled in wire order.
#[async_trait]
pub trait TurnFeed: Send {
    /// Conversation id from the response headers, when the server sent one.
    fn conversation_header(&self) -> Option<String>;

    /// Next normalized event, or `None` once the feed is exhausted.
    async fn next_event(&mut self) -> Result<Option<TurnEvent>, TurnError>;
}

#[derive(Debug)]
pub struct AgentApiClient {
    http: Client,
    config: AgentApiConfig,
}

impl AgentApiClient {
    pub fn new(config: AgentApiConfig) -> Result<Self, TurnError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(TurnError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AgentApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_turns_url(&self.config.base_url)
    }

    pub fn request_headers(&self, streaming: bool) -> Result<HeaderMap, TurnError> {
        let headers = build_headers(&self.config, streaming)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| TurnError::InvalidBaseUrl(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    TurnError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &TurnRequest,
    ) -> Result<reqwest::RequestBuilder, TurnError> {
        validate_request_payload_shape(request)?;

        let headers = self.request_headers(request.stream)?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(request))
    }

    pub async fn send_with_retry(
        &self,
        request: &TurnRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, TurnError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if is_cancelled(cancellation) {
                return Err(TurnError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let response = await_or_cancel(response, cancellation)
                .await?
                .map_err(TurnError::from);

            match response {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(response);
                    }

                    let status = response.status();
                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_else(|_| {
                            status
                                .canonical_reason()
                                .unwrap_or("request failed")
                                .to_string()
                        });
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(TurnError::Status(status, message));
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt < MAX_RETRIES {
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(TurnError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(TurnError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }
}

#[async_trait]
impl TurnTransport for AgentApiClient {
    async fn open(
        &self,
        request: &TurnRequest,
        cancellation: Option<CancellationSignal>,
    ) -> Result<Box<dyn TurnFeed>, TurnError> {
        let response = self.send_with_retry(request, cancellation.as_ref()).await?;
        let conversation_header = response
            .headers()
            .get(HEADER_CONVERSATION_ID)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        if request.stream {
            Ok(Box::new(StreamFeed {
                conversation_header,
                bytes: response.bytes_stream().boxed(),
                parser: SseParser::default(),
                queue: VecDeque::new(),
                done: false,
                cancellation,
            }))
        } else {
            let body = await_or_cancel(response.json::<BatchResponse>(), cancellation.as_ref())
                .await?
                .map_err(TurnError::from)?;
            Ok(Box::new(BatchFeed {
                conversation_header,
                events: body.into_events().into(),
            }))
        }
    }
}

/// Feed over a live SSE response body.
struct StreamFeed {
    conversation_header: Option<String>,
    bytes: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    parser: SseParser,
    queue: VecDeque<TurnEvent>,
    done: bool,
    cancellation: Option<CancellationSignal>,
}

#[async_trait]
impl TurnFeed for StreamFeed {
    fn conversation_header(&self) -> Option<String> {
        self.conversation_header.clone()
    }

    async fn next_event(&mut self) -> Result<Option<TurnEvent>, TurnError> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }

            let chunk = await_or_cancel(self.bytes.next(), self.cancellation.as_ref()).await?;
            let Some(chunk) = chunk else {
                if self.parser.has_partial_input() {
                    warn!("stream closed with an unterminated frame in the buffer");
                }
                self.done = true;
                return Ok(None);
            };
            if is_cancelled(self.cancellation.as_ref()) {
                return Err(TurnError::Cancelled);
            }
            let chunk = chunk.map_err(TurnError::from)?;
            for record in self.parser.feed(&chunk) {
                if record.data == DONE_SENTINEL {
                    self.done = true;
                    break;
                }
                if let Some(event) = decode_event(&record.data) {
                    self.queue.push_back(event);
                }
            }
        }
    }
}

/// Feed over an already-complete batch response body.
struct BatchFeed {
    conversation_header: Option<String>,
    events: VecDeque<TurnEvent>,
}

#[async_trait]
impl TurnFeed for BatchFeed {
    fn conversation_header(&self) -> Option<String> {
        self.conversation_header.clone()
    }

    async fn next_event(&mut self) -> Result<Option<TurnEvent>, TurnError> {
        Ok(self.events.pop_front())
    }
}

fn validate_request_payload_shape(request: &TurnRequest) -> Result<(), TurnError> {
    if request.input.is_array() {
        return Ok(());
    }

    Err(TurnError::InvalidRequestPayload(format!(
        "'input' must be a JSON array/list, got {}",
        value_type_name(&request.input)
    )))
}

fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, TurnError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(TurnError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(TurnError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::{await_or_cancel, validate_request_payload_shape};
    use crate::error::TurnError;
    use crate::payload::TurnRequest;

    #[test]
    fn non_array_input_is_rejected_before_dispatch() {
        let request = TurnRequest::open(None, json!({"role": "user"}), true);
        let error = validate_request_payload_shape(&request).expect_err("object input");
        assert!(matches!(error, TurnError::InvalidRequestPayload(message)
            if message.contains("object")));

        let request = TurnRequest::open(None, json!([]), true);
        assert!(validate_request_payload_shape(&request).is_ok());
    }

    #[tokio::test]
    async fn await_or_cancel_aborts_a_pending_future() {
        let cancel = Arc::new(AtomicBool::new(false));
        cancel.store(true, Ordering::Release);

        let result = await_or_cancel(
            tokio::time::sleep(std::time::Duration::from_secs(60)),
            Some(&cancel),
        )
        .await;
        assert!(matches!(result, Err(TurnError::Cancelled)));
    }

    #[tokio::test]
    async fn await_or_cancel_passes_output_through_without_a_signal() {
        let result = await_or_cancel(async { 7 }, None).await;
        assert!(matches!(result, Ok(7)));
    }
}
