//! Speech Service - IndexTTS 语音合成服务
//!
//! 构造时校验模型目录，合成时直接委托给已加载的推理引擎

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::application::ports::{InferRequest, TtsEngineLoader, TtsEnginePort, TtsError};
use crate::config::TtsConfig;
use crate::domain::model_files::{
    default_voice_path, download_hint, is_voice_file, missing_model_files, VOICE_EXTENSIONS,
};

/// 语音合成服务
pub struct SpeechService {
    model_dir: PathBuf,
    character: String,
    engine: Arc<dyn TtsEnginePort>,
}

impl std::fmt::Debug for SpeechService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechService")
            .field("model_dir", &self.model_dir)
            .field("character", &self.character)
            .finish_non_exhaustive()
    }
}

impl SpeechService {
    /// 创建服务
    ///
    /// 任一必需模型文件缺失时直接失败，不会调用 `loader`
    pub async fn new(config: &TtsConfig, loader: &dyn TtsEngineLoader) -> Result<Self, TtsError> {
        tracing::info!(character = %config.character, "Initializing IndexTTS service...");

        let model_dir = config.model_dir.clone();
        let missing = missing_model_files(&model_dir).await;
        if !missing.is_empty() {
            tracing::error!(missing = ?missing, "Missing IndexTTS model files");
            tracing::info!("Please download IndexTTS models using:");
            tracing::info!("{}", download_hint(&model_dir));
            return Err(TtsError::MissingModelFiles { model_dir, missing });
        }

        let config_path = config.resolved_config_path();
        let engine = loader.load(&model_dir, &config_path).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize IndexTTS");
            e
        })?;
        tracing::info!(model_dir = %model_dir.display(), "IndexTTS initialized successfully");

        Ok(Self {
            model_dir,
            character: config.character.clone(),
            engine,
        })
    }

    /// 合成语音并写入 `output_path`
    ///
    /// 未指定参考音色时使用 `<model_dir>/<character>.wav`
    pub async fn synthesize_to_file(
        &self,
        text: &str,
        output_path: &Path,
        reference_voice: Option<&Path>,
    ) -> Result<(), TtsError> {
        let voice_ref = match reference_voice {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_voice_path(&self.model_dir, &self.character);
                tracing::info!(voice = %path.display(), "Using default reference voice");
                path
            }
        };

        if !tokio::fs::try_exists(&voice_ref).await? {
            tracing::error!(voice = %voice_ref.display(), "Reference voice not found");
            return Err(TtsError::ReferenceVoiceNotFound(voice_ref));
        }

        let request = InferRequest {
            text: text.to_string(),
            voice_ref,
            output_path: output_path.to_path_buf(),
        };

        self.engine.infer(request).await.map_err(|e| {
            tracing::error!(error = %e, "Error generating speech");
            e
        })
    }

    /// 合成语音并记录耗时
    pub async fn synthesize(
        &self,
        text: &str,
        output_path: &Path,
        reference_voice: Option<&Path>,
    ) -> Result<(), TtsError> {
        let started = Instant::now();
        self.synthesize_to_file(text, output_path, reference_voice)
            .await?;
        tracing::info!(
            output = %output_path.display(),
            "IndexTTS synth done, time used {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// 列出模型目录中的候选参考音色
    pub async fn available_voices(&self) -> Result<Vec<PathBuf>, TtsError> {
        list_voice_files(&self.model_dir, &VOICE_EXTENSIONS).await
    }

    /// 检查引擎是否可用
    pub async fn health_check(&self) -> bool {
        self.engine.health_check().await
    }
}

/// 按扩展名列出目录中的音频文件（不递归，按路径排序）
pub async fn list_voice_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, TtsError> {
    let mut voices = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_voice_file(&path, extensions) {
            voices.push(path);
        }
    }

    voices.sort();
    Ok(voices)
}
