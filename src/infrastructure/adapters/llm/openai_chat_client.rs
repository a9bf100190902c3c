//! OpenAI Chat Client - 调用 OpenAI 兼容的对话补全接口
//!
//! 实现 ChatCompletionPort trait
//!
//! POST {api_base}/chat/completions
//! Request: {"model": "...", "messages": [...], "stream": true?}
//! Response: JSON，或 stream 模式下的 SSE（`data: {...}` ... `data: [DONE]`）

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::{Client, Proxy, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::sse::{SseDecoder, SseEvent};
use crate::application::ports::{
    ChatCompletionPort, ChatError, ChatMessage, ChatRequest, DeltaStream,
};
use crate::config::LlmConfig;

/// 请求体
#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// 非流式响应
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 流式响应中的一个分块
///
/// 服务端中途出错时发送 `{"error": {...}}` 而不是 choices
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// 错误响应体 {"error": {"message": "..."}}
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiChatClientConfig {
    /// 接口基础 URL，如 https://api.openai.com/v1
    pub api_base: String,
    pub api_key: String,
    /// 代理地址；设置后同时启用连接/整体超时
    pub proxy: Option<String>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for OpenAiChatClientConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for OpenAiChatClientConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            proxy: config.proxy.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl OpenAiChatClientConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }
}

/// OpenAI 兼容对话客户端
pub struct OpenAiChatClient {
    client: Client,
    config: OpenAiChatClientConfig,
}

impl OpenAiChatClient {
    /// 创建客户端；配置了代理时替换默认传输层
    pub fn new(config: OpenAiChatClientConfig) -> Result<Self, ChatError> {
        let mut builder = Client::builder();

        if let Some(proxy) = &config.proxy {
            let proxy_config = Proxy::all(proxy.as_str())
                .map_err(|e| ChatError::Configuration(format!("Invalid proxy {}: {}", proxy, e)))?;
            builder = builder
                .proxy(proxy_config)
                .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                .timeout(Duration::from_secs(config.timeout_secs));
            tracing::info!(
                proxy = %proxy,
                connect_timeout_secs = config.connect_timeout_secs,
                timeout_secs = config.timeout_secs,
                "Chat client using HTTP proxy"
            );
        }

        let client = builder
            .build()
            .map_err(|e| ChatError::Configuration(e.to_string()))?;

        tracing::info!(api_base = %config.api_base, "OpenAI API initialized");
        Ok(Self { client, config })
    }

    /// 获取对话补全 URL
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<Response, ChatError> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            stream,
        };

        tracing::debug!(
            url = %self.completions_url(),
            model = %request.model,
            stream,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

fn map_transport_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else if e.is_connect() {
        ChatError::NetworkError(format!("Cannot connect to chat endpoint: {}", e))
    } else {
        ChatError::NetworkError(e.to_string())
    }
}

/// 从一个流式分块中取出增量文本；没有内容时返回 None
fn delta_content(data: &str) -> Result<Option<String>, ChatError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ChatError::InvalidResponse(format!("Bad stream chunk: {}: {}", e, data)))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<Result<String, ChatError>>,
    finished: bool,
}

/// 将 SSE 响应体转换为增量文本流
///
/// 遇到 `[DONE]`、响应体结束或第一个错误时结束
fn delta_stream<S, B>(body: S) -> DeltaStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                if item.is_err() {
                    state.ready.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            let events = match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.feed(bytes.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(map_transport_error(e)), state));
                }
                None => {
                    state.finished = true;
                    state.decoder.finish().into_iter().collect()
                }
            };

            for event in events {
                match event {
                    SseEvent::Done => {
                        state.finished = true;
                        break;
                    }
                    SseEvent::Data(data) => match delta_content(&data) {
                        Ok(Some(content)) => state.ready.push_back(Ok(content)),
                        Ok(None) => {}
                        Err(e) => {
                            state.ready.push_back(Err(e));
                            break;
                        }
                    },
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl ChatCompletionPort for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatError> {
        let response = self.send(&request, false).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatError::InvalidResponse("Response has no message content".to_string()))
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<DeltaStream, ChatError> {
        let response = self.send(&request, true).await?;
        Ok(delta_stream(response.bytes_stream().boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::application::services::ChatService;

    fn body(chunks: &[&str]) -> impl Stream<Item = reqwest::Result<Vec<u8>>> + Send + Unpin + 'static {
        let chunks: Vec<reqwest::Result<Vec<u8>>> =
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        stream::iter(chunks)
    }

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_config_from_llm_config() {
        let llm = LlmConfig {
            api_base: "https://api.deepseek.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            proxy: Some("http://127.0.0.1:7890".to_string()),
            ..Default::default()
        };
        let config = OpenAiChatClientConfig::from(&llm);

        assert_eq!(config.api_base, "https://api.deepseek.com/v1");
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let client =
            OpenAiChatClient::new(OpenAiChatClientConfig::new("http://localhost:1234/v1/", "k"))
                .unwrap();
        assert_eq!(client.completions_url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let config = OpenAiChatClientConfig {
            proxy: Some("not a url".to_string()),
            ..OpenAiChatClientConfig::new("http://localhost", "k")
        };
        assert!(matches!(
            OpenAiChatClient::new(config),
            Err(ChatError::Configuration(_))
        ));
    }

    #[test]
    fn test_body_omits_stream_when_false() {
        let messages = vec![ChatMessage::system("tune"), ChatMessage::user("hi")];
        let body = ChatCompletionBody {
            model: "m",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_delta_content_skips_missing_and_empty() {
        assert_eq!(
            delta_content(r#"{"choices":[{"delta":{"content":"hi"}}]}"#).unwrap(),
            Some("hi".to_string())
        );
        assert_eq!(delta_content(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(), None);
        assert_eq!(delta_content(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap(), None);
        assert_eq!(delta_content(r#"{"choices":[{"delta":{"content":null}}]}"#).unwrap(), None);
        assert_eq!(delta_content(r#"{"choices":[]}"#).unwrap(), None);
        assert!(delta_content("not json").is_err());
    }

    #[tokio::test]
    async fn test_delta_stream_until_done() {
        let raw = format!(
            "{}{}data: {{\"choices\":[{{\"delta\":{{}}}}]}}\n\n{}data: [DONE]\n\n{}",
            chunk("Hello"),
            chunk(" world."),
            chunk(" Bye"),
            chunk("ignored after done"),
        );
        // 按 7 字节切分，模拟网络分块
        let pieces: Vec<String> = raw
            .as_bytes()
            .chunks(7)
            .map(|c| String::from_utf8_lossy(c).to_string())
            .collect();
        let refs: Vec<&str> = pieces.iter().map(|s| s.as_str()).collect();

        let deltas: Vec<String> = delta_stream(body(&refs))
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(deltas, vec!["Hello", " world.", " Bye"]);
    }

    #[tokio::test]
    async fn test_delta_stream_stops_on_bad_chunk() {
        let raw = format!("{}data: {{oops\n\n{}", chunk("first"), chunk("second"));
        let items: Vec<Result<String, ChatError>> = delta_stream(body(&[raw.as_str()])).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "first");
        assert!(matches!(items[1], Err(ChatError::InvalidResponse(_))));
    }

    #[test]
    fn test_delta_content_error_object() {
        match delta_content(r#"{"error":{"message":"rate limited","type":"requests"}}"#) {
            Err(ChatError::Stream(message)) => assert_eq!(message, "rate limited"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delta_stream_ends_on_upstream_error() {
        let raw = format!(
            "{}data: {{\"error\":{{\"message\":\"rate limited\"}}}}\n\n{}",
            chunk("Hello"),
            chunk("never seen"),
        );
        let items: Vec<Result<String, ChatError>> = delta_stream(body(&[raw.as_str()])).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hello");
        match &items[1] {
            Err(ChatError::Stream(message)) => assert_eq!(message, "rate limited"),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    fn sse_body(fragments: &[&str]) -> String {
        let mut body = String::new();
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]})
        ));
        for fragment in fragments {
            body.push_str(&format!(
                "data: {}\n\n",
                json!({"choices": [{"index": 0, "delta": {"content": fragment}}]})
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn client_for(server: &MockServer) -> Arc<OpenAiChatClient> {
        let config = OpenAiChatClientConfig::new(format!("{}/v1", server.uri()), "sk-test");
        Arc::new(OpenAiChatClient::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_ask_returns_message_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "你是派蒙"},
                    {"role": "user", "content": "宇宙的答案是什么？"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "42"},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = ChatService::new("你是派蒙", "gpt-4o-mini", client_for(&server));
        let reply = service.ask("宇宙的答案是什么？").await.unwrap();

        assert_eq!(reply, "42");
    }

    #[tokio::test]
    async fn test_ask_stream_over_sse() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body(&["Hello", " world.", " Next", " sentence!"])),
            )
            .mount(&server)
            .await;

        let service = ChatService::new("tune", "gpt-4o-mini", client_for(&server));
        let chunks: Vec<String> = service
            .ask_stream("hi")
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["Hello world.", "Next sentence!"]);
    }

    #[tokio::test]
    async fn test_api_error_is_propagated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .complete(ChatRequest::with_tune("gpt-4o-mini", "tune", "hi"))
            .await
            .unwrap_err();

        match err {
            ChatError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // 流式请求同样在打开时失败，作为流的唯一一项返回
        let service = ChatService::new("tune", "gpt-4o-mini", client);
        let items: Vec<Result<String, ChatError>> = service.ask_stream("hi").collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ChatError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_null_content_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(ChatRequest::with_tune("m", "tune", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_error_ends_reply() {
        let server = MockServer::start().await;

        let mut body = sse_body(&["The answer is forty", " two."]);
        // 去掉 [DONE]，换成上游中途返回的错误对象
        body.truncate(body.len() - "data: [DONE]\n\n".len());
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"error": {"message": "rate limited", "type": "requests"}})
        ));
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": " Never sent."}}]})
        ));

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let service = ChatService::new("tune", "gpt-4o-mini", client_for(&server));
        let items: Vec<Result<String, ChatError>> = service.ask_stream("hi").collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "The answer is forty two.");
        match &items[1] {
            Err(ChatError::Stream(message)) => assert_eq!(message, "rate limited"),
            other => panic!("unexpected item: {other:?}"),
        }
    }
}
