//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ChatCompletion、TtsEngine、CommandRunner）
//! - services: 对话服务与语音合成服务
//! - setup: IndexTTS 安装流程

pub mod ports;
pub mod services;
pub mod setup;

pub use ports::{
    ChatCompletionPort, ChatError, ChatMessage, ChatRequest, CommandError, CommandOutput,
    CommandRunner, CommandSpec, DeltaStream, InferRequest, Role, TtsEngineLoader, TtsEnginePort,
    TtsError,
};
pub use services::{ChatService, ReplyStream, SpeechService};
pub use setup::{SetupDriver, SetupOutcome, SetupStep};
