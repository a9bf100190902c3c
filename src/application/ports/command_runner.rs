//! Command Runner Port - 外部进程执行抽象
//!
//! 安装脚本与 CLI 推理引擎通过该端口调用 pip / git / huggingface-cli / indextts

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 外部命令错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 可执行文件不存在
    #[error("Program not found: {0}")]
    NotFound(String),

    /// 进程无法启动或等待失败
    #[error("Failed to run {program}: {message}")]
    SpawnFailed { program: String, message: String },
}

/// 要执行的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// 工作目录（None 表示继承当前目录）
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 命令执行结果（stdout/stderr 已捕获）
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// 退出码，被信号终止时为 None
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Command Runner Port
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 执行命令并等待结束；非零退出码不视为错误
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}
