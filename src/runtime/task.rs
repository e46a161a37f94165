//! 任务定义模块
//!
//! 提供统一的任务抽象，运行时中的每个并发行为（HTTP/gRPC 服务、
//! 定时任务、后台循环）都以 `Task` 的形式被管理

use std::future::Future;
use std::pin::Pin;

/// 任务执行结果
pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 任务 trait
///
/// 所有需要在运行时中管理的任务都必须实现此 trait
pub trait Task: Send {
    /// 获取任务名称
    fn name(&self) -> &str;

    /// 运行任务
    ///
    /// # 参数
    /// * `shutdown_rx` - 关闭信号接收器，收到信号后任务应该优雅退出
    fn run(
        self: Box<Self>,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>;
}

/// Spawn 任务
///
/// 包装一个已经构建好的 Future，或一个接收关闭信号的闭包。
/// 需要感知关闭信号的任务（例如带 `serve_with_shutdown` 的服务器）
/// 应使用 [`SpawnTask::with_shutdown`] 延迟构建
pub struct SpawnTask {
    name: String,
    future_fn: Box<
        dyn FnOnce(
                tokio::sync::oneshot::Receiver<()>,
            ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>
            + Send
            + 'static,
    >,
}

impl SpawnTask {
    /// 创建新的 spawn 任务（不需要关闭信号）
    pub fn new<Fut>(name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future_fn: Box::new(move |_shutdown_rx| Box::pin(future)),
        }
    }

    /// 创建新的 spawn 任务（需要关闭信号）
    ///
    /// # 参数
    /// * `name` - 任务名称
    /// * `future_fn` - 闭包，接收 shutdown_rx，返回 Future
    pub fn with_shutdown<F, Fut>(name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(tokio::sync::oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future_fn: Box::new(move |shutdown_rx| Box::pin(future_fn(shutdown_rx))),
        }
    }
}

impl Task for SpawnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        (self.future_fn)(shutdown_rx)
    }
}
