//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置（优先级：环境变量 > 配置文件 > 默认值）
///
/// # 环境变量示例
/// - `CHATVOICE_LLM__API_KEY=sk-...`
/// - `CHATVOICE_LLM__PROXY=http://127.0.0.1:7890`
/// - `CHATVOICE_TTS__MODEL_DIR=/data/index_tts`
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("llm.api_base", "https://api.openai.com/v1")?
        .set_default("llm.model", "gpt-3.5-turbo")?
        .set_default("llm.character", "default")?
        .set_default("llm.tune_dir", "tunes")?
        .set_default("llm.connect_timeout_secs", 10)?
        .set_default("llm.timeout_secs", 60)?
        .set_default("tts.engine", "cli")?
        .set_default("tts.model_dir", "TTS/models/index_tts")?
        .set_default("tts.character", "default")?
        .set_default("tts.program", "indextts")?
        .set_default("tts.url", "http://localhost:8000")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("setup.python", "python3")?
        .set_default("setup.requirements", "requirements.txt")?
        .set_default("setup.submodule_path", "TTS/index-tts")?
        .set_default("setup.huggingface_cli", "huggingface-cli")?
        .set_default("log.level", "info")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 前缀: CHATVOICE_
    // 层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("CHATVOICE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.llm.api_base.is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM API base cannot be empty".to_string(),
        ));
    }

    if config.llm.model.is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM model cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.llm.proxy {
        reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid proxy '{}': {}", proxy, e))
        })?;
        if config.llm.connect_timeout_secs == 0 || config.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Proxy timeouts cannot be 0".to_string(),
            ));
        }
    }

    if config.tts.model_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS model directory cannot be empty".to_string(),
        ));
    }

    if config.tts.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "TTS timeout cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("LLM API Base: {}", config.llm.api_base);
    tracing::info!("LLM Model: {}", config.llm.model);
    tracing::info!("LLM Character: {}", config.llm.character);
    match &config.llm.proxy {
        Some(proxy) => tracing::info!(
            "LLM Proxy: {} (connect {}s, total {}s)",
            proxy,
            config.llm.connect_timeout_secs,
            config.llm.timeout_secs
        ),
        None => tracing::info!("LLM Proxy: none"),
    }
    tracing::info!("TTS Engine: {:?}", config.tts.engine);
    tracing::info!("TTS Model Directory: {:?}", config.tts.model_dir);
    tracing::info!("TTS Character: {}", config.tts.character);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
