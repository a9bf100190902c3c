//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod process;

pub use adapters::{engine_loader, OpenAiChatClient, OpenAiChatClientConfig};
pub use process::ProcessRunner;
