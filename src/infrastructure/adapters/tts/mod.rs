//! TTS Adapter - IndexTTS 引擎实现
//!
//! - cli: 调用 indextts 命令行
//! - http: 调用 IndexTTS HTTP 推理服务

mod cli_tts_engine;
mod http_tts_client;

use std::sync::Arc;

use crate::application::ports::{CommandRunner, TtsEngineLoader};
use crate::config::{TtsConfig, TtsEngineKind};

pub use cli_tts_engine::{CliTtsEngine, CliTtsEngineConfig, CliTtsLoader};
pub use http_tts_client::{HttpTtsClient, HttpTtsClientConfig, HttpTtsLoader};

/// 根据配置选择引擎加载器
pub fn engine_loader(config: &TtsConfig, runner: Arc<dyn CommandRunner>) -> Arc<dyn TtsEngineLoader> {
    match config.engine {
        TtsEngineKind::Cli => Arc::new(CliTtsLoader::new(runner, CliTtsEngineConfig::from(config))),
        TtsEngineKind::Http => Arc::new(HttpTtsLoader::new(HttpTtsClientConfig::from(config))),
    }
}
