//! CLI TTS Engine - 调用 indextts 命令行推理
//!
//! indextts <text> --voice <ref> --output_path <out> --model_dir <dir> --config <cfg> [--device d] [--fp16] --force

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::{
    CommandError, CommandRunner, CommandSpec, InferRequest, TtsEngineLoader, TtsEnginePort,
    TtsError,
};
use crate::config::TtsConfig;

/// CLI 引擎配置
#[derive(Debug, Clone)]
pub struct CliTtsEngineConfig {
    /// indextts 可执行文件
    pub program: String,
    /// 推理设备（None 表示由 indextts 自动选择）
    pub device: Option<String>,
    pub fp16: bool,
}

impl Default for CliTtsEngineConfig {
    fn default() -> Self {
        Self::from(&TtsConfig::default())
    }
}

impl From<&TtsConfig> for CliTtsEngineConfig {
    fn from(config: &TtsConfig) -> Self {
        Self {
            program: config.program.clone(),
            device: config.device.clone(),
            fp16: config.fp16,
        }
    }
}

/// indextts 命令行引擎
pub struct CliTtsEngine {
    runner: Arc<dyn CommandRunner>,
    config: CliTtsEngineConfig,
    model_dir: PathBuf,
    config_path: PathBuf,
}

impl CliTtsEngine {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: CliTtsEngineConfig,
        model_dir: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            config,
            model_dir: model_dir.into(),
            config_path: config_path.into(),
        }
    }

    /// 构造一次推理的命令行
    fn command(&self, request: &InferRequest) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.config.program)
            .arg(request.text.as_str())
            .arg("--voice")
            .arg(request.voice_ref.display().to_string())
            .arg("--output_path")
            .arg(request.output_path.display().to_string())
            .arg("--model_dir")
            .arg(self.model_dir.display().to_string())
            .arg("--config")
            .arg(self.config_path.display().to_string());

        if let Some(device) = &self.config.device {
            spec = spec.arg("--device").arg(device.as_str());
        }
        if self.config.fp16 {
            spec = spec.arg("--fp16");
        }
        // 输出文件已存在时覆盖
        spec.arg("--force")
    }
}

#[async_trait]
impl TtsEnginePort for CliTtsEngine {
    async fn infer(&self, request: InferRequest) -> Result<(), TtsError> {
        let spec = self.command(&request);
        tracing::debug!(
            text_len = request.text.len(),
            voice_ref = %request.voice_ref.display(),
            output = %request.output_path.display(),
            "Running indextts"
        );

        let output = self.runner.run(&spec).await.map_err(|e| match e {
            CommandError::NotFound(program) => TtsError::EngineFailed(format!(
                "{} not found, install IndexTTS first (pip install -e TTS/index-tts)",
                program
            )),
            other => TtsError::EngineFailed(other.to_string()),
        })?;

        if !output.success() {
            return Err(TtsError::EngineFailed(format!(
                "indextts exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&request.output_path).await? {
            return Err(TtsError::EngineFailed(format!(
                "indextts produced no output at {}",
                request.output_path.display()
            )));
        }

        tracing::info!(output = %request.output_path.display(), "TTS inference completed");
        Ok(())
    }
}

/// CLI 引擎加载器
pub struct CliTtsLoader {
    runner: Arc<dyn CommandRunner>,
    config: CliTtsEngineConfig,
}

impl CliTtsLoader {
    pub fn new(runner: Arc<dyn CommandRunner>, config: CliTtsEngineConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl TtsEngineLoader for CliTtsLoader {
    async fn load(
        &self,
        model_dir: &Path,
        config_path: &Path,
    ) -> Result<Arc<dyn TtsEnginePort>, TtsError> {
        if !tokio::fs::try_exists(config_path).await? {
            return Err(TtsError::LoadFailed(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }

        tracing::info!(
            program = %self.config.program,
            device = ?self.config.device,
            fp16 = self.config.fp16,
            "IndexTTS CLI engine ready"
        );
        Ok(Arc::new(CliTtsEngine::new(
            self.runner.clone(),
            self.config.clone(),
            model_dir,
            config_path,
        )))
    }
}
