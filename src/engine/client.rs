// src/engine/client.rs

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest_eventsource::{retry, Event, EventSource};
use tracing::{debug, warn};

use crate::error::{http_error_kind, EngineError};
use crate::types::{ChatCompletionChunk, ChatCompletionRequest};

/// Chunks of one streamed completion, in arrival order.
///
/// A transport failure is yielded once as `Err` and ends the stream.
pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk, EngineError>>;

/// Something that can open a streaming chat completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ChunkStream, EngineError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint speaking SSE.
#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl OpenAIClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ChunkStream, EngineError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            functions = request.functions.len(),
            "Opening completion stream"
        );

        let mut request_builder = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = self.api_token.as_deref() {
            request_builder = request_builder.bearer_auth(token);
        }

        let mut es = EventSource::new(request_builder)
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        es.set_retry_policy(Box::new(retry::Never));

        Ok(sse_chunks(es))
    }
}

fn sse_chunks(es: EventSource) -> ChunkStream {
    stream::unfold(Some(es), |state| async move {
        let mut es = state?;
        loop {
            match es.next().await {
                None => return None,
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(msg))) => {
                    if msg.data.trim() == "[DONE]" {
                        es.close();
                        return None;
                    }
                    match serde_json::from_str::<ChatCompletionChunk>(&msg.data) {
                        Ok(chunk) => return Some((Ok(chunk), Some(es))),
                        Err(e) => warn!(error = %e, data = %msg.data, "Skipping unparseable chunk"),
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => {
                    es.close();
                    return None;
                }
                Some(Err(e)) => {
                    es.close();
                    let err = map_sse_error(e).await;
                    warn!(error = %err, "Completion stream failed");
                    return Some((Err(err), None));
                }
            }
        }
    })
    .boxed()
}

async fn map_sse_error(e: reqwest_eventsource::Error) -> EngineError {
    use reqwest_eventsource::Error;

    match e {
        Error::InvalidStatusCode(status, response) => EngineError::Api {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        },
        Error::InvalidContentType(content_type, response) => EngineError::Api {
            status: response.status().as_u16(),
            body: format!(
                "unexpected content type {:?}: {}",
                content_type,
                response.text().await.unwrap_or_default()
            ),
        },
        Error::Transport(e) => EngineError::Transport(format!("{} {}", http_error_kind(&e), e)),
        other => EngineError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(events: &[&str]) -> String {
        events.iter().map(|e| format!("data: {}\n\n", e)).collect()
    }

    async fn collect(client: &OpenAIClient) -> Vec<Result<ChatCompletionChunk, EngineError>> {
        let request = ChatCompletionRequest::streaming("gpt-4", vec![ChatMessage::user("hi")]);
        client.stream_chat(request).await.unwrap().collect().await
    }

    #[tokio::test]
    async fn test_streams_chunks_until_done() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
            "not json",
            r#"{"choices":[{"delta":{"content":"lo"}}]}"#,
            "[DONE]",
            r#"{"choices":[{"delta":{"content":"ignored"}}]}"#,
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(reqwest::Client::new(), server.uri(), Some("sk-test".into()));
        let chunks = collect(&client).await;

        let text: Vec<String> = chunks
            .into_iter()
            .map(|c| c.unwrap().content().to_string())
            .collect();
        assert_eq!(text, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_stream_end_without_done() {
        let server = MockServer::start().await;
        let body = sse(&[r#"{"choices":[{"delta":{"function_call":{"name":"fetch_url","arguments":"{\""}}}]}"#]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(reqwest::Client::new(), server.uri(), None);
        let chunks = collect(&client).await;

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.function_call().unwrap().name.as_deref(), Some("fetch_url"));
        assert_eq!(chunk.function_arguments(), "{\"");
    }

    #[tokio::test]
    async fn test_error_status_becomes_single_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new(reqwest::Client::new(), server.uri(), Some("sk".into()));
        let chunks = collect(&client).await;

        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            Err(EngineError::Api { status, body }) => {
                assert_eq!(*status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = OpenAIClient::new(reqwest::Client::new(), "http://127.0.0.1:9", None);
        let chunks = collect(&client).await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(EngineError::Transport(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAIClient::new(reqwest::Client::new(), "http://host/v1/", None);
        assert_eq!(client.endpoint(), "http://host/v1/chat/completions");
    }
}
