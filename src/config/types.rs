//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 对话模型配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 安装脚本配置
    #[serde(default)]
    pub setup: SetupConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 对话模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI 兼容接口的 Base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API Key
    #[serde(default)]
    pub api_key: String,

    /// 模型标识
    #[serde(default = "default_model")]
    pub model: String,

    /// 角色名（用于查找提示词文件）
    #[serde(default = "default_character")]
    pub character: String,

    /// 内联提示词，优先于 tune_dir
    #[serde(default)]
    pub tune: Option<String>,

    /// 提示词目录，文件名为 `<character>.txt`
    #[serde(default = "default_tune_dir")]
    pub tune_dir: PathBuf,

    /// HTTP 代理地址，未设置时使用默认传输层
    #[serde(default)]
    pub proxy: Option<String>,

    /// 代理模式下的连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 代理模式下的整体超时（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_character() -> String {
    "default".to_string()
}

fn default_tune_dir() -> PathBuf {
    PathBuf::from("tunes")
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
            character: default_character(),
            tune: None,
            tune_dir: default_tune_dir(),
            proxy: None,
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// TTS 引擎类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngineKind {
    /// 调用 indextts 命令行
    #[default]
    Cli,
    /// 调用 HTTP 推理服务
    Http,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 引擎类型
    #[serde(default)]
    pub engine: TtsEngineKind,

    /// 模型目录
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// 模型配置文件，默认为 `<model_dir>/config.yaml`
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// 角色名（默认参考音色为 `<model_dir>/<character>.wav`）
    #[serde(default = "default_character")]
    pub character: String,

    /// indextts 可执行文件
    #[serde(default = "default_tts_program")]
    pub program: String,

    /// 推理设备，如 cuda:0 / cpu
    #[serde(default)]
    pub device: Option<String>,

    /// 是否启用半精度推理
    #[serde(default)]
    pub fp16: bool,

    /// HTTP 推理服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// HTTP 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("TTS/models/index_tts")
}

fn default_tts_program() -> String {
    "indextts".to_string()
}

fn default_tts_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: TtsEngineKind::default(),
            model_dir: default_model_dir(),
            config_path: None,
            character: default_character(),
            program: default_tts_program(),
            device: None,
            fp16: false,
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
        }
    }
}

impl TtsConfig {
    /// 实际使用的模型配置文件路径
    pub fn resolved_config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(crate::domain::model_files::CONFIG_FILE))
    }
}

/// 安装脚本配置
#[derive(Debug, Clone, Deserialize)]
pub struct SetupConfig {
    /// Python 解释器
    #[serde(default = "default_python")]
    pub python: String,

    /// 依赖清单
    #[serde(default = "default_requirements")]
    pub requirements: PathBuf,

    /// IndexTTS 子模块路径
    #[serde(default = "default_submodule")]
    pub submodule_path: PathBuf,

    /// 模型下载工具
    #[serde(default = "default_hf_cli")]
    pub huggingface_cli: String,
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_requirements() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_submodule() -> PathBuf {
    PathBuf::from("TTS/index-tts")
}

fn default_hf_cli() -> String {
    "huggingface-cli".to_string()
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            requirements: default_requirements(),
            submodule_path: default_submodule(),
            huggingface_cli: default_hf_cli(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
