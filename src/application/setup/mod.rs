//! Setup - IndexTTS 环境安装
//!
//! 检查 Python / CUDA、安装依赖、初始化子模块、下载模型并自检

mod driver;
mod steps;

pub use driver::{SetupDriver, SetupOutcome, SetupStep};
pub use steps::{log_next_steps, parse_python_version, standard_driver, SetupContext, MIN_PYTHON};
