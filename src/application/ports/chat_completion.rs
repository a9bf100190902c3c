//! Chat Completion Port - 对话补全服务抽象
//!
//! 定义 OpenAI 兼容对话接口的抽象，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 对话补全错误
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Upstream stream error: {0}")]
    Stream(String),

    #[error("Tune not found: {0}")]
    TuneNotFound(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// 对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 对话补全请求
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// 模型标识
    pub model: String,
    /// 消息列表（system 在前，user 在后）
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// 以固定的 system 提示词 + 用户输入构造请求
    pub fn with_tune(model: impl Into<String>, tune: &str, text: &str) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::system(tune), ChatMessage::user(text)],
        }
    }
}

/// 增量文本流，每一项是一个非空的 delta 片段
pub type DeltaStream = BoxStream<'static, Result<String, ChatError>>;

/// Chat Completion Port
///
/// 远端对话补全服务的抽象接口
#[async_trait]
pub trait ChatCompletionPort: Send + Sync {
    /// 非流式补全，返回助手回复的完整内容
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatError>;

    /// 流式补全，返回增量片段流
    async fn complete_stream(&self, request: ChatRequest) -> Result<DeltaStream, ChatError>;
}
