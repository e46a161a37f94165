//! 能力容器测试
//!
//! 覆盖：注册分类、按注册顺序分发、多能力模块的独立分发、
//! 通用模块扫描、并发关闭与 panic 隔离

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::get;
use clap::Command;
use tonic::service::Routes;

use ember_app_core::container::{
    CloserProvider, CommandProvider, Container, CronProvider, GrpcProvider, HttpProvider, Module,
    RunProvider,
};
use ember_app_core::cron::Crontab;
use ember_app_core::runtime::ServiceRuntime;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log_of(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

/// HTTP + Closer 双能力模块
struct ApiModule {
    log: Log,
}

impl HttpProvider for ApiModule {
    fn provide_http(&self, router: Router) -> Router {
        self.log.lock().unwrap().push("api:http");
        router.route("/api/ping", get(|| async { "pong" }))
    }
}

impl CloserProvider for ApiModule {
    fn provide_closer(&self) {
        self.log.lock().unwrap().push("api:closer");
    }
}

impl Module for ApiModule {
    fn as_http(&self) -> Option<&dyn HttpProvider> {
        Some(self)
    }
    fn as_closer(&self) -> Option<&dyn CloserProvider> {
        Some(self)
    }
}

/// 仅 Cron 能力的模块
struct ReportModule {
    log: Log,
}

impl CronProvider for ReportModule {
    fn provide_cron(&self, crontab: Crontab) -> Crontab {
        self.log.lock().unwrap().push("report:cron");
        crontab
            .try_add("report", "0 0 3 * * *", || Box::pin(async {}))
            .expect("valid cron spec")
    }
}

impl Module for ReportModule {
    fn as_cron(&self) -> Option<&dyn CronProvider> {
        Some(self)
    }
}

/// 记录调用顺序的 HTTP 模块
struct NamedHttpModule {
    tag: &'static str,
    log: Log,
}

impl HttpProvider for NamedHttpModule {
    fn provide_http(&self, router: Router) -> Router {
        self.log.lock().unwrap().push(self.tag);
        router
    }
}

impl Module for NamedHttpModule {
    fn as_http(&self) -> Option<&dyn HttpProvider> {
        Some(self)
    }
}

/// 不满足任何能力的模块，注册合法但从不被分发
struct InertModule;

impl Module for InertModule {}

/// 自定义扫描目标：容器并不原生分发迁移能力
struct MigrationModule {
    scripts: Vec<&'static str>,
}

impl Module for MigrationModule {}

#[test]
fn http_dispatch_preserves_registration_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut container = Container::new();
    container.add_module(NamedHttpModule { tag: "first", log: Arc::clone(&log) });
    container.add_module(NamedHttpModule { tag: "second", log: Arc::clone(&log) });
    container.add_module(NamedHttpModule { tag: "third", log: Arc::clone(&log) });

    container.apply_router(Router::new());

    assert_eq!(log_of(&log), vec!["first", "second", "third"]);
}

#[test]
fn multi_capability_module_is_dispatched_by_each_apply() {
    struct Both {
        log: Log,
    }
    impl HttpProvider for Both {
        fn provide_http(&self, router: Router) -> Router {
            self.log.lock().unwrap().push("both:http");
            router
        }
    }
    impl GrpcProvider for Both {
        fn provide_grpc(&self, routes: Routes) -> Routes {
            self.log.lock().unwrap().push("both:grpc");
            routes
        }
    }
    impl Module for Both {
        fn as_http(&self) -> Option<&dyn HttpProvider> {
            Some(self)
        }
        fn as_grpc(&self) -> Option<&dyn GrpcProvider> {
            Some(self)
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut container = Container::new();
    container.add_module(Both { log: Arc::clone(&log) });

    container.apply_router(Router::new());
    container.apply_grpc(Routes::default());

    assert_eq!(log_of(&log), vec!["both:http", "both:grpc"]);
}

#[test]
fn command_modules_extend_the_root_command() {
    struct MigrateCommand;
    impl CommandProvider for MigrateCommand {
        fn provide_command(&self, command: Command) -> Command {
            command.subcommand(Command::new("migrate").about("run database migrations"))
        }
    }
    impl Module for MigrateCommand {
        fn as_command(&self) -> Option<&dyn CommandProvider> {
            Some(self)
        }
    }

    let mut container = Container::new();
    container.add_module(MigrateCommand);

    let root = container.apply_root_command(Command::new("app"));
    assert!(root.get_subcommands().any(|c| c.get_name() == "migrate"));
}

#[test]
fn run_modules_add_tasks_to_the_group() {
    struct Worker;
    impl RunProvider for Worker {
        fn provide_run_group(&self, runtime: ServiceRuntime) -> ServiceRuntime {
            runtime.add_spawn("worker", async { Ok(()) })
        }
    }
    impl Module for Worker {
        fn as_run(&self) -> Option<&dyn RunProvider> {
            Some(self)
        }
    }

    let mut container = Container::new();
    container.add_module(Worker);

    let runtime = container.apply_run_group(ServiceRuntime::new("test"));
    assert_eq!(runtime.task_count(), 1);
}

#[test]
fn inert_module_is_stored_but_never_dispatched() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut container = Container::new();
    container.add_module(InertModule);
    container.add_module(NamedHttpModule { tag: "only", log: Arc::clone(&log) });

    container.apply_router(Router::new());

    assert_eq!(container.modules().len(), 2);
    assert_eq!(log_of(&log), vec!["only"]);
}

#[test]
fn bare_closer_is_not_added_to_the_module_collection() {
    let mut container = Container::new();
    container.add_closer(|| {});
    assert!(container.modules().is_empty());
}

#[test]
fn modules_can_be_scanned_by_concrete_type() {
    let mut container = Container::new();
    container.add_module(MigrationModule { scripts: vec!["001_init"] });
    container.add_module(InertModule);
    container.add_module(MigrationModule { scripts: vec!["002_users", "003_index"] });

    let scripts: Vec<&str> = container
        .modules()
        .filter::<MigrationModule>()
        .flat_map(|m| m.scripts.iter().copied())
        .collect();
    assert_eq!(scripts, vec!["001_init", "002_users", "003_index"]);

    // 谓词扫描等价于类型过滤
    let count = container
        .modules()
        .filter_map(|m| m.downcast_ref::<MigrationModule>())
        .count();
    assert_eq!(count, 2);
}

/// 三模块场景：A（HTTP+Closer）、B（Cron）、C（裸关闭回调）
#[tokio::test]
async fn mixed_module_scenario() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut container = Container::new();

    container.add_module(ApiModule { log: Arc::clone(&log) });
    container.add_module(ReportModule { log: Arc::clone(&log) });
    let closer_log = Arc::clone(&log);
    container.add_closer(move || {
        closer_log.lock().unwrap().push("bare:closer");
    });

    container.apply_router(Router::new());
    assert_eq!(log_of(&log), vec!["api:http"]);

    let crontab = container.apply_crontab(Crontab::new());
    assert_eq!(crontab.job_count(), 1);
    assert_eq!(log_of(&log), vec!["api:http", "report:cron"]);

    container.shutdown().await;
    let entries = log_of(&log);
    assert_eq!(entries.len(), 4);
    assert!(entries.contains(&"api:closer"));
    assert!(entries.contains(&"bare:closer"));
}

#[tokio::test]
async fn shutdown_runs_closers_concurrently_and_joins_all() {
    let finished = Arc::new(AtomicUsize::new(0));
    let mut container = Container::new();

    for _ in 0..3 {
        let finished = Arc::clone(&finished);
        container.add_closer(move || {
            std::thread::sleep(Duration::from_millis(100));
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    let start = Instant::now();
    container.shutdown().await;
    let elapsed = start.elapsed();

    // 三个 100ms 的回调并发执行：总耗时接近 100ms 而不是 300ms
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(250), "closers ran sequentially: {elapsed:?}");
}

#[tokio::test]
async fn shutdown_isolates_a_panicking_closer() {
    let finished = Arc::new(AtomicUsize::new(0));
    let mut container = Container::new();

    container.add_closer(|| panic!("boom"));
    for _ in 0..2 {
        let finished = Arc::clone(&finished);
        container.add_closer(move || {
            std::thread::sleep(Duration::from_millis(20));
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    container.shutdown().await;
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_invokes_each_closer_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut container = Container::new();
    let counter = Arc::clone(&calls);
    container.add_closer(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.shutdown().await;
    container.shutdown().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
