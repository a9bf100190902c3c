//! HTTP TTS Client - 调用 IndexTTS HTTP 推理服务
//!
//! 实现 TtsEnginePort trait，通过 HTTP 调用外部 TTS 服务，并将返回的音频写入输出文件
//!
//! 外部 TTS API:
//! POST http://localhost:8000/api/tts/infer
//! Request: {"text": "...", "voice_ref": "/path/to/ref.wav"}  (JSON)
//! Response: audio/wav binary

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{InferRequest, TtsEngineLoader, TtsEnginePort, TtsError};
use crate::config::TtsConfig;

/// TTS 推理请求体 (JSON)
#[derive(Debug, Serialize)]
struct TtsHttpRequest<'a> {
    /// 要合成的文本
    text: &'a str,
    /// 参考音频路径（TTS 服务自行读取并缓存）
    voice_ref: String,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self::from(&TtsConfig::default())
    }
}

impl From<&TtsConfig> for HttpTtsClientConfig {
    fn from(config: &TtsConfig) -> Self {
        Self {
            base_url: config.url.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// HTTP TTS 客户端
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 获取推理 URL
    fn infer_url(&self) -> String {
        format!("{}/api/tts/infer", self.config.base_url.trim_end_matches('/'))
    }

    /// 获取健康检查 URL
    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn infer(&self, request: InferRequest) -> Result<(), TtsError> {
        let http_request = TtsHttpRequest {
            text: &request.text,
            voice_ref: request.voice_ref.display().to_string(),
        };

        tracing::debug!(
            url = %self.infer_url(),
            text_len = http_request.text.len(),
            voice_ref = %http_request.voice_ref,
            "Sending TTS infer request"
        );

        let response = self
            .client
            .post(self.infer_url())
            .json(&http_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else if e.is_connect() {
                    TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
                } else {
                    TtsError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::ServiceError(format!("Failed to read audio: {}", e)))?;

        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&request.output_path, &audio_data).await?;

        tracing::info!(
            output = %request.output_path.display(),
            audio_size = audio_data.len(),
            "TTS inference completed"
        );

        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// HTTP 引擎加载器
///
/// 模型由远端服务加载，这里只创建客户端并探测服务状态
pub struct HttpTtsLoader {
    config: HttpTtsClientConfig,
}

impl HttpTtsLoader {
    pub fn new(config: HttpTtsClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TtsEngineLoader for HttpTtsLoader {
    async fn load(
        &self,
        model_dir: &Path,
        _config_path: &Path,
    ) -> Result<Arc<dyn TtsEnginePort>, TtsError> {
        let client = HttpTtsClient::new(self.config.clone())?;
        if !client.health_check().await {
            tracing::warn!(url = %self.config.base_url, "TTS service health check failed");
        }
        tracing::info!(
            url = %self.config.base_url,
            model_dir = %model_dir.display(),
            "HTTP TTS engine ready"
        );
        Ok(Arc::new(client))
    }
}
