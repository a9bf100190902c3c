//! IndexTTS 模型文件约定
//!
//! 模型目录必须包含的权重/配置文件、参考音色的文件扩展名以及下载命令

use std::path::{Path, PathBuf};

/// HuggingFace 上的模型仓库
pub const MODEL_REPO: &str = "IndexTeam/IndexTTS-1.5";

/// 模型配置文件名
pub const CONFIG_FILE: &str = "config.yaml";

/// 模型目录中必须存在的文件
pub const REQUIRED_MODEL_FILES: [&str; 7] = [
    CONFIG_FILE,
    "bigvgan_discriminator.pth",
    "bigvgan_generator.pth",
    "bpe.model",
    "dvae.pth",
    "gpt.pth",
    "unigram_12000.vocab",
];

/// 支持的参考音色扩展名
pub const VOICE_EXTENSIONS: [&str; 4] = ["wav", "mp3", "flac", "m4a"];

/// 返回模型目录中缺失的必需文件（保持 REQUIRED_MODEL_FILES 的顺序）
pub async fn missing_model_files(model_dir: &Path) -> Vec<String> {
    let mut missing = Vec::new();
    for name in REQUIRED_MODEL_FILES {
        let present = tokio::fs::try_exists(model_dir.join(name)).await.unwrap_or(false);
        if !present {
            missing.push(name.to_string());
        }
    }
    missing
}

/// 是否为参考音色文件（按扩展名判断，忽略大小写）
pub fn is_voice_file(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed)))
        .unwrap_or(false)
}

/// 角色默认参考音色路径：`<model_dir>/<character>.wav`
pub fn default_voice_path(model_dir: &Path, character: &str) -> PathBuf {
    model_dir.join(format!("{}.wav", character))
}

/// 下载模型的 huggingface-cli 参数
pub fn download_args(model_dir: &Path) -> Vec<String> {
    let mut args = vec!["download".to_string(), MODEL_REPO.to_string()];
    args.extend(REQUIRED_MODEL_FILES.iter().map(|f| f.to_string()));
    args.push("--local-dir".to_string());
    args.push(model_dir.display().to_string());
    args
}

/// 下载提示（用于缺失文件时的日志）
pub fn download_hint(model_dir: &Path) -> String {
    format!("huggingface-cli {}", download_args(model_dir).join(" "))
}
