//! 能力容器模块
//!
//! `Container` 收集各自独立编写的模块，在注册时按能力契约分类，
//! 随后把每类宿主对象（HTTP 路由、gRPC 路由表、定时任务调度器、
//! CLI 命令树、运行时任务组）分发给声明了对应能力的模块，并在
//! 进程退出时并发执行所有关闭回调

pub mod collection;

use std::sync::Arc;

use axum::Router;
use clap::Command;
use tokio::task::JoinSet;
use tonic::service::Routes;
use tracing::{error, info, warn};

use crate::cron::Crontab;
use crate::runtime::ServiceRuntime;

pub use collection::{AsAny, ModuleCollection};

/// 提供定时任务的能力
pub trait CronProvider: Send + Sync {
    fn provide_cron(&self, crontab: Crontab) -> Crontab;
}

/// 提供 CLI 子命令的能力
pub trait CommandProvider: Send + Sync {
    fn provide_command(&self, command: Command) -> Command;
}

/// 提供 HTTP 路由的能力
pub trait HttpProvider: Send + Sync {
    fn provide_http(&self, router: Router) -> Router;
}

/// 提供 gRPC 服务的能力
pub trait GrpcProvider: Send + Sync {
    fn provide_grpc(&self, routes: Routes) -> Routes;
}

/// 提供关闭回调的能力，服务退出时被调用
pub trait CloserProvider: Send + Sync {
    fn provide_closer(&self);
}

/// 提供运行时任务的能力
///
/// 用于注册任何常驻型行为，例如消息消费者可以在这里启动
pub trait RunProvider: Send + Sync {
    fn provide_run_group(&self, runtime: ServiceRuntime) -> ServiceRuntime;
}

/// 模块：能力分类的载体
///
/// 一个模块可以同时满足零个、一个或多个能力。六个 `as_*` 访问器
/// 默认返回 `None`，模块只需覆盖自己实现了的那几个：
///
/// ```rust
/// use ember_app_core::container::{HttpProvider, Module};
///
/// struct ApiModule;
///
/// impl HttpProvider for ApiModule {
///     fn provide_http(&self, router: axum::Router) -> axum::Router {
///         router
///     }
/// }
///
/// impl Module for ApiModule {
///     fn as_http(&self) -> Option<&dyn HttpProvider> {
///         Some(self)
///     }
/// }
/// ```
pub trait Module: AsAny + Send + Sync + 'static {
    fn as_http(&self) -> Option<&dyn HttpProvider> {
        None
    }
    fn as_grpc(&self) -> Option<&dyn GrpcProvider> {
        None
    }
    fn as_cron(&self) -> Option<&dyn CronProvider> {
        None
    }
    fn as_run(&self) -> Option<&dyn RunProvider> {
        None
    }
    fn as_command(&self) -> Option<&dyn CommandProvider> {
        None
    }
    fn as_closer(&self) -> Option<&dyn CloserProvider> {
        None
    }
}

type HostFn<H> = Box<dyn Fn(H) -> H + Send + Sync>;
type CloserFn = Box<dyn FnOnce() + Send>;

/// 能力容器，持有所有已注册的模块
///
/// 注册顺序即分发顺序：每个能力序列内先注册的模块先被调用。
/// 注册与分发都是同步调用，只有 [`Container::shutdown`] 是并发的
#[derive(Default)]
pub struct Container {
    http_providers: Vec<HostFn<Router>>,
    grpc_providers: Vec<HostFn<Routes>>,
    cron_providers: Vec<HostFn<Crontab>>,
    run_providers: Vec<HostFn<ServiceRuntime>>,
    command_providers: Vec<HostFn<Command>>,
    closer_providers: Vec<CloserFn>,
    modules: ModuleCollection,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块
    ///
    /// 对六个能力契约各做一次结构性检查，满足的能力在对应序列末尾
    /// 追加一个绑定回调；模块本身总是进入通用模块集合。分类不是
    /// 校验，一个能力都不满足的模块同样合法（只存储、不分发），
    /// 注册永远不会失败
    pub fn add_module<M: Module>(&mut self, module: M) {
        let module = Arc::new(module);

        if module.as_http().is_some() {
            let m = Arc::clone(&module);
            self.http_providers.push(Box::new(move |router| match m.as_http() {
                Some(p) => p.provide_http(router),
                None => router,
            }));
        }
        if module.as_grpc().is_some() {
            let m = Arc::clone(&module);
            self.grpc_providers.push(Box::new(move |routes| match m.as_grpc() {
                Some(p) => p.provide_grpc(routes),
                None => routes,
            }));
        }
        if module.as_cron().is_some() {
            let m = Arc::clone(&module);
            self.cron_providers.push(Box::new(move |crontab| match m.as_cron() {
                Some(p) => p.provide_cron(crontab),
                None => crontab,
            }));
        }
        if module.as_run().is_some() {
            let m = Arc::clone(&module);
            self.run_providers.push(Box::new(move |runtime| match m.as_run() {
                Some(p) => p.provide_run_group(runtime),
                None => runtime,
            }));
        }
        if module.as_command().is_some() {
            let m = Arc::clone(&module);
            self.command_providers
                .push(Box::new(move |command| match m.as_command() {
                    Some(p) => p.provide_command(command),
                    None => command,
                }));
        }
        if module.as_closer().is_some() {
            let m = Arc::clone(&module);
            self.closer_providers.push(Box::new(move || {
                if let Some(p) = m.as_closer() {
                    p.provide_closer();
                }
            }));
        }

        self.modules.push(module);
    }

    /// 直接注册一个关闭回调
    ///
    /// 等价于只满足 Closer 能力的模块，用于无需声明完整模块类型的
    /// 临时清理动作；不进入通用模块集合
    pub fn add_closer<F>(&mut self, closer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.closer_providers.push(Box::new(closer));
    }

    /// 将 HTTP 路由依次交给每个注册了 HTTP 能力的模块
    ///
    /// 每个进程每个宿主至多调用一次；重复调用会把所有模块重复
    /// 注册到同一个宿主上，属于调用方错误
    pub fn apply_router(&self, mut router: Router) -> Router {
        for p in &self.http_providers {
            router = p(router);
        }
        router
    }

    /// 将 gRPC 路由表依次交给每个注册了 gRPC 能力的模块
    pub fn apply_grpc(&self, mut routes: Routes) -> Routes {
        for p in &self.grpc_providers {
            routes = p(routes);
        }
        routes
    }

    /// 将定时任务调度器依次交给每个注册了 Cron 能力的模块
    pub fn apply_crontab(&self, mut crontab: Crontab) -> Crontab {
        for p in &self.cron_providers {
            crontab = p(crontab);
        }
        crontab
    }

    /// 将根命令依次交给每个注册了 Command 能力的模块
    pub fn apply_root_command(&self, mut command: Command) -> Command {
        for p in &self.command_providers {
            command = p(command);
        }
        command
    }

    /// 将服务运行时依次交给每个注册了 RunEntry 能力的模块
    pub fn apply_run_group(&self, mut runtime: ServiceRuntime) -> ServiceRuntime {
        for p in &self.run_providers {
            runtime = p(runtime);
        }
        runtime
    }

    /// 并发执行所有注册的关闭回调，全部返回后才返回
    ///
    /// 每个回调在独立的阻塞任务上运行，回调之间没有顺序保证，
    /// 必须能安全地并行执行。回调 panic 会被任务边界隔离并记录为
    /// 非致命事件，不影响其余回调完成。本方法不设超时；需要截止
    /// 时间的调用方可用 `tokio::time::timeout` 包裹。每个回调恰好
    /// 被调用一次，再次调用 `shutdown` 是空操作
    pub async fn shutdown(&mut self) {
        let closers = std::mem::take(&mut self.closer_providers);
        if closers.is_empty() {
            return;
        }

        info!(closer_count = closers.len(), "🛑 Shutting down registered closers");

        let mut join_set = JoinSet::new();
        for closer in closers {
            join_set.spawn_blocking(closer);
        }

        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "❌ Closer panicked during shutdown");
                } else {
                    warn!(error = %e, "Closer task cancelled");
                }
            }
        }

        info!("✅ All closers completed");
    }

    /// 返回容器中的所有模块
    ///
    /// 用于扫描容器不原生分发的自定义能力，例如：
    ///
    /// ```rust,ignore
    /// let migrations: Vec<_> = container
    ///     .modules()
    ///     .filter::<DatabaseModule>()
    ///     .flat_map(|m| m.provide_migration())
    ///     .collect();
    /// ```
    pub fn modules(&self) -> &ModuleCollection {
        &self.modules
    }
}
