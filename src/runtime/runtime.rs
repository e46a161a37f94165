//! 服务运行时实现
//!
//! 以并发 actor 组的方式统一管理服务的生命周期：
//! - 所有任务并发启动，任意一个任务退出即中断整个任务组
//! - 支持 Ctrl+C 与 [`ShutdownHandle`] 两种外部关闭途径
//! - 优雅停机，超时后强制中止

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::runtime::config::RuntimeConfig;
use crate::runtime::task::{Task, TaskResult};
use anyhow::Result;

/// 服务运行时
///
/// # 使用示例
///
/// ```rust,no_run
/// use ember_app_core::runtime::ServiceRuntime;
///
/// # async fn demo() -> anyhow::Result<()> {
/// let runtime = ServiceRuntime::new("my-service")
///     .add_spawn("worker", async { Ok(()) })
///     .add_spawn_with_shutdown("server", |shutdown_rx| async move {
///         let _ = shutdown_rx.await;
///         Ok(())
///     });
///
/// runtime.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct ServiceRuntime {
    service_name: String,
    tasks: Vec<Box<dyn Task>>,
    config: RuntimeConfig,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

/// 外部关闭句柄
///
/// 可克隆、可跨任务传递；触发后运行时开始优雅停机
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<()>,
}

impl ShutdownHandle {
    /// 触发关闭，多次触发等价于一次
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
    }
}

impl ServiceRuntime {
    /// 创建新的服务运行时
    ///
    /// # 参数
    /// * `service_name` - 服务名称（用于日志）
    pub fn new(service_name: impl Into<String>) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            service_name: service_name.into(),
            tasks: Vec::new(),
            config: RuntimeConfig::default(),
            trigger_tx,
            trigger_rx,
        }
    }

    /// 设置运行时配置
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// 添加任务
    pub fn add_task(mut self, task: Box<dyn Task>) -> Self {
        info!(task_name = %task.name(), "Adding task to runtime");
        self.tasks.push(task);
        self
    }

    /// 添加 spawn 任务（直接添加 Future，不需要关闭信号）
    pub fn add_spawn<Fut>(self, name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        use crate::runtime::task::SpawnTask;
        self.add_task(Box::new(SpawnTask::new(name, future)))
    }

    /// 添加 spawn 任务（需要关闭信号）
    ///
    /// # 参数
    /// * `name` - 任务名称
    /// * `future_fn` - 闭包，接收 shutdown_rx，返回 Future
    pub fn add_spawn_with_shutdown<F, Fut>(self, name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        use crate::runtime::task::SpawnTask;
        self.add_task(Box::new(SpawnTask::with_shutdown(name, future_fn)))
    }

    /// 获取外部关闭句柄
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.trigger_tx.clone(),
        }
    }

    /// 任务数量
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 运行服务
    ///
    /// 执行以下步骤：
    /// 1. 并发启动所有任务
    /// 2. 等待关闭信号（Ctrl+C、关闭句柄，或任意任务退出）
    /// 3. 向所有任务发送关闭信号
    /// 4. 在超时时间内等待任务退出，超时则强制中止
    pub async fn run(mut self) -> Result<()> {
        info!(
            service_name = %self.service_name,
            task_count = self.tasks.len(),
            "🚀 Starting service runtime"
        );

        let tasks = std::mem::take(&mut self.tasks);
        let (mut join_set, task_shutdowns) = Self::start_tasks(tasks);
        let mut trigger_rx = self.trigger_rx;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received (Ctrl+C)");
            }
            _ = trigger_rx.recv() => {
                info!("Shutdown signal received (handle triggered)");
            }
            result = join_set.join_next(), if !join_set.is_empty() => {
                match result {
                    Some(Ok(Ok(()))) => {
                        info!("Task exited, interrupting the group");
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "❌ Task failed, interrupting the group");
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "❌ Task panicked, interrupting the group");
                    }
                    None => {}
                }
            }
        }

        // 发送关闭信号给所有任务
        for tx in task_shutdowns {
            let _ = tx.send(());
        }

        Self::wait_for_tasks_shutdown(&self.config, &mut join_set).await;

        info!(service_name = %self.service_name, "Service runtime stopped");
        Ok(())
    }

    /// 并发启动所有任务，返回 JoinSet 与各任务的关闭信号发送端
    fn start_tasks(
        tasks: Vec<Box<dyn Task>>,
    ) -> (JoinSet<TaskResult>, Vec<oneshot::Sender<()>>) {
        let mut join_set = JoinSet::new();
        let mut task_shutdowns = Vec::new();

        for task in tasks {
            let task_name = task.name().to_string();
            let (task_shutdown_tx, task_shutdown_rx) = oneshot::channel();
            task_shutdowns.push(task_shutdown_tx);

            let task_future = task.run(task_shutdown_rx);

            join_set.spawn(async move {
                let result = task_future.await;
                match &result {
                    Ok(_) => {
                        info!(task_name = %task_name, "✅ Task completed");
                    }
                    Err(e) => {
                        error!(task_name = %task_name, error = %e, "❌ Task failed");
                    }
                }
                result
            });
        }

        (join_set, task_shutdowns)
    }

    /// 等待所有任务退出
    async fn wait_for_tasks_shutdown(config: &RuntimeConfig, join_set: &mut JoinSet<TaskResult>) {
        match tokio::time::timeout(config.shutdown_timeout, async {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok(Ok(_)) => {
                        info!("Task completed gracefully");
                    }
                    Ok(Err(e)) => {
                        warn!("Task completed with error: {}", e);
                    }
                    Err(e) => {
                        warn!("Task join error: {}", e);
                    }
                }
            }
        })
        .await
        {
            Ok(_) => {
                info!("All tasks completed");
            }
            Err(_) => {
                warn!("Tasks shutdown timeout, forcing exit");
                join_set.abort_all();
            }
        }
    }
}
