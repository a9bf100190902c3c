//! LLM Adapter - OpenAI 兼容对话客户端实现

mod openai_chat_client;
mod sse;

pub use openai_chat_client::{OpenAiChatClient, OpenAiChatClientConfig};
pub use sse::{SseDecoder, SseEvent};
