//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod chat_completion;
mod command_runner;
mod tts_engine;

pub use chat_completion::{
    ChatCompletionPort, ChatError, ChatMessage, ChatRequest, DeltaStream, Role,
};
pub use command_runner::{CommandError, CommandOutput, CommandRunner, CommandSpec};
pub use tts_engine::{InferRequest, TtsEngineLoader, TtsEnginePort, TtsError};
