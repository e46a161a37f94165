//! 定时任务调度模块
//!
//! 提供 `Crontab` 作为 Cron 能力的宿主对象：模块在分发阶段向其注册
//! 命名的定时任务，随后整个 `Crontab` 作为一个运行时任务被托管

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::runtime::task::{Task, TaskResult};

/// 定时任务体
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// 定时任务构造函数，每次触发调用一次
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

struct Job {
    name: String,
    schedule: Schedule,
    run: JobFn,
}

/// 定时任务调度器
///
/// 调度循环：计算所有任务中最近的下一次触发时间，休眠至该时刻或
/// 收到关闭信号；到期的任务各自在独立的 tokio 任务中执行，慢任务
/// 不会阻塞调度循环
#[derive(Default)]
pub struct Crontab {
    jobs: Vec<Job>,
}

impl Crontab {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册定时任务（表达式已解析）
    pub fn add<F>(mut self, name: impl Into<String>, schedule: Schedule, job: F) -> Self
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(job_name = %name, "Adding cron job");
        self.jobs.push(Job {
            name,
            schedule,
            run: Arc::new(job),
        });
        self
    }

    /// 注册定时任务（从字符串解析表达式）
    ///
    /// 表达式为六段式（秒 分 时 日 月 星期），解析失败返回错误
    pub fn try_add<F>(self, name: impl Into<String>, spec: &str, job: F) -> Result<Self>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        let schedule = Schedule::from_str(spec).map_err(|e| CoreError::Cron {
            spec: spec.to_string(),
            source: Box::new(e),
        })?;
        Ok(self.add(name, schedule, job))
    }

    /// 已注册的任务数量
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// 运行调度循环，直到收到关闭信号
    pub async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> TaskResult {
        info!(job_count = self.jobs.len(), "🕐 Crontab started");

        loop {
            let now = Utc::now();
            let next_at = self
                .jobs
                .iter()
                .filter_map(|job| job.schedule.after(&now).next())
                .min();

            let Some(at) = next_at else {
                // 没有任何任务：仅等待关闭信号
                let _ = (&mut shutdown_rx).await;
                break;
            };

            let wait = (at - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    for job in &self.jobs {
                        let due = job
                            .schedule
                            .after(&now)
                            .next()
                            .map(|t| t <= at)
                            .unwrap_or(false);
                        if due {
                            debug!(job_name = %job.name, "Cron job fired");
                            let run = Arc::clone(&job.run);
                            tokio::spawn(async move {
                                run().await;
                            });
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        info!("🛑 Crontab stopped");
        Ok(())
    }
}

impl Task for Crontab {
    fn name(&self) -> &str {
        "crontab"
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        Box::pin((*self).run(shutdown_rx))
    }
}
