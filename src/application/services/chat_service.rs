//! Chat Service - 角色对话服务
//!
//! 为每个请求拼接固定的角色提示词（tune），转发到对话补全端口；
//! 流式模式下按句子缓冲规则输出片段

use futures_util::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::{ChatCompletionPort, ChatError, ChatRequest, DeltaStream};
use crate::config::LlmConfig;
use crate::domain::SentenceBuffer;

/// 按句子输出的回复流
pub type ReplyStream = BoxStream<'static, Result<String, ChatError>>;

/// 解析角色提示词
///
/// 优先使用内联的 `tune`，否则读取 `<tune_dir>/<character>.txt`
pub async fn resolve_tune(config: &LlmConfig) -> Result<String, ChatError> {
    if let Some(tune) = &config.tune {
        return Ok(tune.clone());
    }

    let path: PathBuf = config.tune_dir.join(format!("{}.txt", config.character));
    match tokio::fs::read_to_string(&path).await {
        Ok(tune) => Ok(tune.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ChatError::TuneNotFound(path.display().to_string()))
        }
        Err(e) => Err(ChatError::Configuration(format!(
            "Failed to read tune {}: {}",
            path.display(),
            e
        ))),
    }
}

/// 角色对话服务
pub struct ChatService {
    tune: String,
    model: String,
    client: Arc<dyn ChatCompletionPort>,
    counter: AtomicU64,
}

impl ChatService {
    pub fn new(
        tune: impl Into<String>,
        model: impl Into<String>,
        client: Arc<dyn ChatCompletionPort>,
    ) -> Self {
        let model = model.into();
        tracing::info!(model = %model, "Chat service initialized");
        Self {
            tune: tune.into(),
            model,
            client,
            counter: AtomicU64::new(0),
        }
    }

    /// 根据配置创建（解析提示词）
    pub async fn from_config(
        config: &LlmConfig,
        client: Arc<dyn ChatCompletionPort>,
    ) -> Result<Self, ChatError> {
        tracing::info!(character = %config.character, "Initializing chat service...");
        let tune = resolve_tune(config).await?;
        Ok(Self::new(tune, config.model.clone(), client))
    }

    /// 已发出的请求数
    pub fn request_count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        self.counter.fetch_add(1, Ordering::Relaxed);
        ChatRequest::with_tune(self.model.clone(), &self.tune, text)
    }

    /// 一次性获取完整回复
    pub async fn ask(&self, text: &str) -> Result<String, ChatError> {
        let started = Instant::now();
        let request = self.build_request(text);

        let reply = self.client.complete(request).await?;

        tracing::info!(
            "Chat response: {}, time used {:.2}s",
            reply,
            started.elapsed().as_secs_f64()
        );
        Ok(reply)
    }

    /// 流式获取回复，按句子输出
    ///
    /// 请求在首次拉取时发出；上游错误作为最后一项返回
    pub fn ask_stream(&self, text: &str) -> ReplyStream {
        let state = StreamState {
            client: self.client.clone(),
            request: Some(self.build_request(text)),
            deltas: None,
            buffer: SentenceBuffer::new(),
            started: Instant::now(),
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            if let Some(request) = state.request.take() {
                match state.client.complete_stream(request).await {
                    Ok(deltas) => state.deltas = Some(deltas),
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            let mut deltas = state.deltas.take()?;
            while let Some(item) = deltas.next().await {
                match item {
                    Ok(fragment) => {
                        if let Some(chunk) = state.buffer.push(&fragment) {
                            state.log_chunk(&chunk);
                            state.deltas = Some(deltas);
                            return Some((Ok(chunk), state));
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Chat stream failed");
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            state.done = true;
            let rest = state.buffer.finish()?;
            state.log_chunk(&rest);
            Some((Ok(rest), state))
        })
        .boxed()
    }
}

struct StreamState {
    client: Arc<dyn ChatCompletionPort>,
    request: Option<ChatRequest>,
    deltas: Option<DeltaStream>,
    buffer: SentenceBuffer,
    started: Instant,
    done: bool,
}

impl StreamState {
    fn log_chunk(&self, chunk: &str) {
        tracing::info!(
            "Chat stream response: {}, @Time {:.2}s",
            chunk,
            self.started.elapsed().as_secs_f64()
        );
    }
}
