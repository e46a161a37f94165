//! 服务运行时框架
//!
//! 并发 actor 组：容器通过 RunEntry 能力把任务注入这里统一托管

pub mod config;
#[allow(clippy::module_inception)]
pub mod runtime;
pub mod task;

pub use config::RuntimeConfig;
pub use runtime::{ServiceRuntime, ShutdownHandle};
pub use task::{SpawnTask, Task, TaskResult};
