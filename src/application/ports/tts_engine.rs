//! TTS Engine Port - TTS 推理引擎抽象
//!
//! 定义 TTS 推理的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Missing IndexTTS model files in {}: {missing:?}", .model_dir.display())]
    MissingModelFiles { model_dir: PathBuf, missing: Vec<String> },

    #[error("Reference voice not found: {}", .0.display())]
    ReferenceVoiceNotFound(PathBuf),

    #[error("Failed to load TTS engine: {0}")]
    LoadFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Engine failed: {0}")]
    EngineFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TtsError {
    fn from(err: std::io::Error) -> Self {
        TtsError::IoError(err.to_string())
    }
}

/// TTS 推理请求
#[derive(Debug, Clone)]
pub struct InferRequest {
    /// 要合成的文本内容
    pub text: String,
    /// 参考音色文件
    pub voice_ref: PathBuf,
    /// 输出音频文件路径
    pub output_path: PathBuf,
}

/// TTS Engine Port
///
/// 已加载的推理引擎，每次调用生成一个输出文件
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 执行 TTS 推理，结果写入 `request.output_path`
    async fn infer(&self, request: InferRequest) -> Result<(), TtsError>;

    /// 检查引擎是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

/// 引擎加载器
///
/// 在模型文件校验通过后才会被调用
#[async_trait]
pub trait TtsEngineLoader: Send + Sync {
    async fn load(
        &self,
        model_dir: &Path,
        config_path: &Path,
    ) -> Result<Arc<dyn TtsEnginePort>, TtsError>;
}
