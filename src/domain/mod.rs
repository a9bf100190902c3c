//! Domain Layer - 领域层
//!
//! 不依赖任何外部服务的纯逻辑:
//! - 流式句子缓冲
//! - IndexTTS 模型文件约定

pub mod model_files;
mod sentence_buffer;

pub use sentence_buffer::SentenceBuffer;
