//! Application Services - 用例服务
//!
//! - ChatService: 角色对话（阻塞 / 流式）
//! - SpeechService: IndexTTS 语音合成

mod chat_service;
mod speech_service;

pub use chat_service::{resolve_tune, ChatService, ReplyStream};
pub use speech_service::{list_voice_files, SpeechService};
