//! Setup Driver - 按固定顺序执行安装步骤
//!
//! 任一必需步骤失败即终止，后续步骤不再执行

use async_trait::async_trait;
use std::process::ExitCode;

/// 单个安装步骤
#[async_trait]
pub trait SetupStep: Send + Sync {
    /// 步骤名称（用于日志）
    fn name(&self) -> &'static str;

    /// 仅提示性的步骤，失败时不终止安装
    fn advisory(&self) -> bool {
        false
    }

    /// 执行步骤，返回是否成功
    async fn run(&self) -> bool;
}

/// 安装结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Completed,
    Aborted { step: &'static str },
}

impl SetupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SetupOutcome::Completed)
    }

    /// 进程退出码
    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// 安装驱动
pub struct SetupDriver {
    steps: Vec<Box<dyn SetupStep>>,
}

impl SetupDriver {
    pub fn new(steps: Vec<Box<dyn SetupStep>>) -> Self {
        Self { steps }
    }

    #[cfg(test)]
    pub(crate) fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// 依次执行所有步骤
    pub async fn run(&self) -> SetupOutcome {
        tracing::info!("Starting IndexTTS setup...");
        tracing::info!("{}", "=".repeat(50));

        for step in &self.steps {
            tracing::debug!(step = step.name(), "Running setup step");
            let ok = step.run().await;

            if ok {
                continue;
            }
            if step.advisory() {
                tracing::warn!(step = step.name(), "Advisory setup step reported a problem");
                continue;
            }

            tracing::error!(step = step.name(), "Setup step failed, aborting");
            return SetupOutcome::Aborted { step: step.name() };
        }

        tracing::info!("{}", "=".repeat(50));
        tracing::info!("IndexTTS setup completed successfully!");
        SetupOutcome::Completed
    }
}
