//! Chatvoice - 角色对话 + IndexTTS 语音合成
//!
//! 子命令:
//! - ask: 与角色对话（可流式输出）
//! - say: 合成语音到文件
//! - voices: 列出可用参考音色
//! - setup: 安装 IndexTTS 环境

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use chatvoice::application::services::{ChatService, SpeechService};
use chatvoice::application::setup::{log_next_steps, standard_driver, SetupContext};
use chatvoice::config::{load_config_from_path, print_config};
use chatvoice::infrastructure::{engine_loader, OpenAiChatClient, OpenAiChatClientConfig, ProcessRunner};

#[derive(Parser)]
#[command(name = "chatvoice")]
#[command(about = "Character chat and IndexTTS speech synthesis", long_about = None)]
struct Cli {
    /// 配置文件路径（默认搜索 config.toml / config.local.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the character a question
    Ask {
        text: String,

        /// Print the reply sentence by sentence as it streams in
        #[arg(long)]
        stream: bool,
    },

    /// Synthesize speech into an audio file
    Say {
        text: String,

        /// Output audio file
        #[arg(short, long)]
        output: PathBuf,

        /// Reference voice (defaults to <model_dir>/<character>.wav)
        #[arg(long)]
        voice: Option<PathBuf>,
    },

    /// List reference voices in the model directory
    Voices,

    /// Install IndexTTS, download its models and verify the installation
    Setup,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},chatvoice={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    print_config(&config);

    let runner = Arc::new(ProcessRunner::new());

    match cli.command {
        Commands::Ask { text, stream } => {
            let client = Arc::new(OpenAiChatClient::new(OpenAiChatClientConfig::from(&config.llm))?);
            let service = ChatService::from_config(&config.llm, client).await?;

            if stream {
                let mut replies = service.ask_stream(&text);
                while let Some(chunk) = replies.next().await {
                    println!("{}", chunk?);
                }
            } else {
                println!("{}", service.ask(&text).await?);
            }
        }
        Commands::Say {
            text,
            output,
            voice,
        } => {
            let loader = engine_loader(&config.tts, runner);
            let service = SpeechService::new(&config.tts, loader.as_ref()).await?;
            service.synthesize(&text, &output, voice.as_deref()).await?;
            println!("{}", output.display());
        }
        Commands::Voices => {
            let loader = engine_loader(&config.tts, runner);
            let service = SpeechService::new(&config.tts, loader.as_ref()).await?;
            for voice in service.available_voices().await? {
                println!("{}", voice.display());
            }
        }
        Commands::Setup => {
            let ctx = SetupContext {
                setup: config.setup.clone(),
                tts: config.tts.clone(),
                runner: runner.clone(),
                loader: engine_loader(&config.tts, runner),
            };
            let outcome = standard_driver(Arc::new(ctx)).run().await;
            if outcome.is_success() {
                log_next_steps(&config.tts);
            }
            return Ok(outcome.exit_code());
        }
    }

    Ok(ExitCode::SUCCESS)
}
