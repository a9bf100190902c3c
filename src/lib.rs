//! Chatvoice - 角色对话 + IndexTTS 语音合成
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 流式句子缓冲
//! - IndexTTS 模型文件约定
//!
//! 应用层 (application/):
//! - Ports: ChatCompletion, TtsEngine, CommandRunner
//! - Services: ChatService, SpeechService
//! - Setup: 安装步骤与驱动
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: OpenAI 兼容客户端, IndexTTS CLI / HTTP 引擎
//! - Process: 子进程执行

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config_from_path, AppConfig};
