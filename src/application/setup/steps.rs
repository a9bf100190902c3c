//! Setup Steps - IndexTTS 安装步骤
//!
//! 所有外部命令通过 CommandRunner 执行，输出被捕获，失败时记录 stderr

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::driver::{SetupDriver, SetupStep};
use crate::application::ports::{CommandError, CommandRunner, CommandSpec, TtsEngineLoader};
use crate::application::services::{list_voice_files, SpeechService};
use crate::config::{SetupConfig, TtsConfig};
use crate::domain::model_files;

/// 最低 Python 版本
pub const MIN_PYTHON: (u32, u32) = (3, 8);

/// 安装步骤共享的上下文
pub struct SetupContext {
    pub setup: SetupConfig,
    pub tts: TtsConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub loader: Arc<dyn TtsEngineLoader>,
}

impl SetupContext {
    fn voices_dir(&self) -> PathBuf {
        self.tts.model_dir.join("voices")
    }

    /// 执行命令，失败时记录日志并返回 false
    async fn run_checked(&self, spec: CommandSpec, what: &str) -> bool {
        tracing::debug!(command = %spec, "Running command");
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                tracing::error!(
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "Failed to {}",
                    what
                );
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Error trying to {}", what);
                false
            }
        }
    }
}

/// 标准安装流程
pub fn standard_driver(ctx: Arc<SetupContext>) -> SetupDriver {
    let steps: Vec<Box<dyn SetupStep>> = vec![
        Box::new(CheckPython(ctx.clone())),
        Box::new(CheckCuda(ctx.clone())),
        Box::new(InstallDependencies(ctx.clone())),
        Box::new(InitSubmodule(ctx.clone())),
        Box::new(InstallFromSource(ctx.clone())),
        Box::new(CreateDirectories(ctx.clone())),
        Box::new(DownloadModels(ctx.clone())),
        Box::new(TestInstallation(ctx.clone())),
        Box::new(CheckReferenceVoices(ctx)),
    ];
    SetupDriver::new(steps)
}

/// 安装完成后的提示
pub fn log_next_steps(tts: &TtsConfig) {
    let voices = tts.model_dir.join("voices");
    tracing::info!("");
    tracing::info!("Next steps:");
    tracing::info!("1. Add reference voice files to {}/", voices.display());
    tracing::info!("2. List voices: chatvoice voices");
    tracing::info!("3. Try synthesis: chatvoice say \"你好\" --output test_output.wav");
}

/// 解析 `python --version` 输出，如 "Python 3.10.12"
pub fn parse_python_version(output: &str) -> Option<(u32, u32)> {
    let version = output.trim().strip_prefix("Python")?.trim();
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

pub struct CheckPython(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for CheckPython {
    fn name(&self) -> &'static str {
        "check_python"
    }

    async fn run(&self) -> bool {
        let spec = CommandSpec::new(&self.0.setup.python).arg("--version");
        let output = match self.0.runner.run(&spec).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                tracing::error!(stderr = %output.stderr.trim(), "Python is not usable");
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "Python interpreter not found");
                return false;
            }
        };

        // 旧版本解释器把版本号打印到 stderr
        let text = if output.stdout.trim().is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };

        match parse_python_version(text) {
            Some(version) if version >= MIN_PYTHON => {
                tracing::info!("Python version: {}", text.trim());
                true
            }
            Some(_) => {
                tracing::error!(
                    "Python {}.{} or higher is required, found {}",
                    MIN_PYTHON.0,
                    MIN_PYTHON.1,
                    text.trim()
                );
                false
            }
            None => {
                tracing::error!(output = %text.trim(), "Cannot determine Python version");
                false
            }
        }
    }
}

const CUDA_CHECK_SCRIPT: &str =
    "import torch; print(torch.cuda.get_device_name(0) if torch.cuda.is_available() else '')";

pub struct CheckCuda(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for CheckCuda {
    fn name(&self) -> &'static str {
        "check_cuda"
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn run(&self) -> bool {
        let spec = CommandSpec::new(&self.0.setup.python).args(["-c", CUDA_CHECK_SCRIPT]);
        match self.0.runner.run(&spec).await {
            Ok(output) if output.success() => {
                let device = output.stdout.trim();
                if device.is_empty() {
                    tracing::warn!("CUDA not available, will use CPU");
                    false
                } else {
                    tracing::info!("CUDA available: {}", device);
                    true
                }
            }
            _ => {
                tracing::warn!("PyTorch not installed, CUDA check skipped");
                false
            }
        }
    }
}

pub struct InstallDependencies(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for InstallDependencies {
    fn name(&self) -> &'static str {
        "install_dependencies"
    }

    async fn run(&self) -> bool {
        tracing::info!("Installing dependencies...");

        let requirements = &self.0.setup.requirements;
        if !tokio::fs::try_exists(requirements).await.unwrap_or(false) {
            tracing::error!("{} not found", requirements.display());
            return false;
        }

        let spec = CommandSpec::new(&self.0.setup.python)
            .args(["-m", "pip", "install", "-r"])
            .arg(requirements.display().to_string());
        let ok = self.0.run_checked(spec, "install dependencies").await;
        if ok {
            tracing::info!("Dependencies installed successfully");
        }
        ok
    }
}

pub struct InitSubmodule(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for InitSubmodule {
    fn name(&self) -> &'static str {
        "init_submodule"
    }

    async fn run(&self) -> bool {
        tracing::info!("Initializing IndexTTS submodule...");

        let spec = CommandSpec::new("git")
            .args(["submodule", "update", "--init", "--recursive"])
            .arg(self.0.setup.submodule_path.display().to_string());
        let ok = self.0.run_checked(spec, "initialize submodule").await;
        if ok {
            tracing::info!("IndexTTS submodule initialized successfully");
        }
        ok
    }
}

pub struct InstallFromSource(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for InstallFromSource {
    fn name(&self) -> &'static str {
        "install_from_source"
    }

    async fn run(&self) -> bool {
        tracing::info!("Installing IndexTTS from source...");

        let source = &self.0.setup.submodule_path;
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            tracing::error!(path = %source.display(), "IndexTTS submodule not found");
            return false;
        }

        let spec = CommandSpec::new(&self.0.setup.python)
            .args(["-m", "pip", "install", "-e", "."])
            .current_dir(source);
        let ok = self.0.run_checked(spec, "install IndexTTS from source").await;
        if ok {
            tracing::info!("IndexTTS installed from source successfully");
        }
        ok
    }
}

pub struct CreateDirectories(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for CreateDirectories {
    fn name(&self) -> &'static str {
        "create_directories"
    }

    async fn run(&self) -> bool {
        tracing::info!("Creating directories...");

        for dir in [self.0.tts.model_dir.clone(), self.0.voices_dir()] {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::error!(path = %dir.display(), error = %e, "Failed to create directory");
                return false;
            }
            tracing::info!("Created directory: {}", dir.display());
        }
        true
    }
}

pub struct DownloadModels(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for DownloadModels {
    fn name(&self) -> &'static str {
        "download_models"
    }

    async fn run(&self) -> bool {
        tracing::info!("Downloading IndexTTS models...");

        let model_dir = &self.0.tts.model_dir;
        if let Err(e) = tokio::fs::create_dir_all(model_dir).await {
            tracing::error!(path = %model_dir.display(), error = %e, "Failed to create model directory");
            return false;
        }

        let spec = CommandSpec::new(&self.0.setup.huggingface_cli)
            .args(model_files::download_args(model_dir));
        match self.0.runner.run(&spec).await {
            Ok(output) if output.success() => {
                tracing::info!("IndexTTS models downloaded successfully");
                true
            }
            Ok(output) => {
                tracing::error!(stderr = %output.stderr.trim(), "Failed to download models");
                false
            }
            Err(CommandError::NotFound(program)) => {
                tracing::error!("{} not found. Please install it first:", program);
                tracing::error!("pip install huggingface-hub");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Error downloading models");
                false
            }
        }
    }
}

pub struct TestInstallation(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for TestInstallation {
    fn name(&self) -> &'static str {
        "test_installation"
    }

    async fn run(&self) -> bool {
        tracing::info!("Testing installation...");

        let config = TtsConfig {
            character: "test".to_string(),
            ..self.0.tts.clone()
        };
        let service = match SpeechService::new(&config, self.0.loader.as_ref()).await {
            Ok(service) => service,
            Err(e) => {
                tracing::error!(error = %e, "Installation test failed");
                return false;
            }
        };
        tracing::info!("IndexTTS service initialized successfully");

        match service.available_voices().await {
            Ok(voices) => {
                tracing::info!("Available voices: {}", voices.len());
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Installation test failed");
                false
            }
        }
    }
}

pub struct CheckReferenceVoices(pub Arc<SetupContext>);

#[async_trait]
impl SetupStep for CheckReferenceVoices {
    fn name(&self) -> &'static str {
        "check_reference_voices"
    }

    fn advisory(&self) -> bool {
        true
    }

    async fn run(&self) -> bool {
        tracing::info!("Checking for reference voices...");

        let voices_dir = self.0.voices_dir();
        let voices = list_voice_files(&voices_dir, &["wav", "mp3"])
            .await
            .unwrap_or_default();

        if voices.is_empty() {
            tracing::warn!("No reference voices found");
            tracing::info!("Please add reference voice files to {}/", voices_dir.display());
            tracing::info!("Supported formats: .wav, .mp3, .flac, .m4a");
            tracing::info!("Recommended: 5-30 seconds of clear speech without background noise");
            return false;
        }

        tracing::info!("Found {} reference voice(s)", voices.len());
        for voice in &voices {
            if let Some(name) = voice.file_name() {
                tracing::info!("  - {}", name.to_string_lossy());
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    use crate::application::ports::{
        CommandOutput, InferRequest, TtsEnginePort, TtsError,
    };

    enum Reply {
        Output(CommandOutput),
        Missing,
    }

    /// 按程序名返回预设结果的假执行器
    #[derive(Default)]
    struct FakeRunner {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl FakeRunner {
        fn reply(mut self, program: &str, code: i32, stdout: &str, stderr: &str) -> Self {
            self.replies.insert(
                program.to_string(),
                Reply::Output(CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                }),
            );
            self
        }

        fn missing(mut self, program: &str) -> Self {
            self.replies.insert(program.to_string(), Reply::Missing);
            self
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push(spec.clone());
            match self.replies.get(&spec.program) {
                Some(Reply::Output(output)) => Ok(output.clone()),
                Some(Reply::Missing) | None => Err(CommandError::NotFound(spec.program.clone())),
            }
        }
    }

    struct NoopEngine;

    #[async_trait]
    impl TtsEnginePort for NoopEngine {
        async fn infer(&self, _request: InferRequest) -> Result<(), TtsError> {
            Ok(())
        }
    }

    struct NoopLoader;

    #[async_trait]
    impl TtsEngineLoader for NoopLoader {
        async fn load(
            &self,
            _model_dir: &Path,
            _config_path: &Path,
        ) -> Result<Arc<dyn TtsEnginePort>, TtsError> {
            Ok(Arc::new(NoopEngine))
        }
    }

    fn context(root: &TempDir, runner: FakeRunner) -> (Arc<SetupContext>, Arc<FakeRunner>) {
        let runner = Arc::new(runner);
        let ctx = SetupContext {
            setup: SetupConfig {
                requirements: root.path().join("requirements.txt"),
                submodule_path: root.path().join("index-tts"),
                ..Default::default()
            },
            tts: TtsConfig {
                model_dir: root.path().join("models"),
                ..Default::default()
            },
            runner: runner.clone(),
            loader: Arc::new(NoopLoader),
        };
        (Arc::new(ctx), runner)
    }

    #[test]
    fn test_parse_python_version() {
        assert_eq!(parse_python_version("Python 3.10.12\n"), Some((3, 10)));
        assert_eq!(parse_python_version("Python 3.8.0rc1"), Some((3, 8)));
        assert_eq!(parse_python_version("Python 3.13"), Some((3, 13)));
        assert_eq!(parse_python_version("Python 2.7.18"), Some((2, 7)));
        assert_eq!(parse_python_version("garbage"), None);
    }

    #[tokio::test]
    async fn test_check_python_rejects_old_version() {
        let root = tempdir().unwrap();
        let (ctx, _) = context(&root, FakeRunner::default().reply("python3", 0, "", "Python 2.7.18"));
        assert!(!CheckPython(ctx).run().await);

        let (ctx, _) = context(&root, FakeRunner::default().reply("python3", 0, "Python 3.11.4", ""));
        assert!(CheckPython(ctx).run().await);
    }

    #[tokio::test]
    async fn test_check_cuda_is_advisory() {
        let root = tempdir().unwrap();
        let (ctx, _) = context(&root, FakeRunner::default().reply("python3", 0, "\n", ""));
        let step = CheckCuda(ctx);

        assert!(step.advisory());
        assert!(!step.run().await);
    }

    #[tokio::test]
    async fn test_install_dependencies_requires_requirements_file() {
        let root = tempdir().unwrap();
        let (ctx, runner) = context(&root, FakeRunner::default().reply("python3", 0, "", ""));

        assert!(!InstallDependencies(ctx.clone()).run().await);
        assert!(runner.calls.lock().unwrap().is_empty());

        std::fs::write(root.path().join("requirements.txt"), "openai\n").unwrap();
        assert!(InstallDependencies(ctx).run().await);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args[..4], ["-m", "pip", "install", "-r"]);
    }

    #[tokio::test]
    async fn test_init_submodule_reports_failure() {
        let root = tempdir().unwrap();
        let (ctx, _) = context(&root, FakeRunner::default().reply("git", 128, "", "fatal: not a git repository"));
        assert!(!InitSubmodule(ctx).run().await);
    }

    #[tokio::test]
    async fn test_install_from_source_runs_in_submodule_dir() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("index-tts")).unwrap();
        let (ctx, runner) = context(&root, FakeRunner::default().reply("python3", 0, "", ""));

        assert!(InstallFromSource(ctx).run().await);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].current_dir, Some(root.path().join("index-tts")));
        assert_eq!(calls[0].args, vec!["-m", "pip", "install", "-e", "."]);
    }

    #[tokio::test]
    async fn test_download_models_missing_cli() {
        let root = tempdir().unwrap();
        let (ctx, runner) = context(&root, FakeRunner::default().missing("huggingface-cli"));

        assert!(!DownloadModels(ctx).run().await);
        // 模型目录仍然会被创建
        assert!(root.path().join("models").is_dir());
        assert_eq!(runner.calls.lock().unwrap()[0].args[1], model_files::MODEL_REPO);
    }

    #[tokio::test]
    async fn test_installation_check_against_model_dir() {
        let root = tempdir().unwrap();
        let (ctx, _) = context(&root, FakeRunner::default());

        assert!(CreateDirectories(ctx.clone()).run().await);
        assert!(!TestInstallation(ctx.clone()).run().await);

        for name in model_files::REQUIRED_MODEL_FILES {
            std::fs::write(root.path().join("models").join(name), b"x").unwrap();
        }
        assert!(TestInstallation(ctx.clone()).run().await);

        assert!(!CheckReferenceVoices(ctx.clone()).run().await);
        std::fs::write(root.path().join("models/voices/alice.wav"), b"x").unwrap();
        assert!(CheckReferenceVoices(ctx).run().await);
    }

    #[tokio::test]
    async fn test_standard_driver_aborts_on_missing_python() {
        let root = tempdir().unwrap();
        let (ctx, runner) = context(&root, FakeRunner::default());
        let driver = standard_driver(ctx);

        assert_eq!(driver.step_names().len(), 9);
        let outcome = driver.run().await;

        assert!(!outcome.is_success());
        // 只尝试了 python --version
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
        assert!(!root.path().join("models").exists());
    }
}
