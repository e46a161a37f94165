//! 服务运行时测试

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ember_app_core::runtime::{RuntimeConfig, ServiceRuntime};
use tokio_test::assert_ok;

#[tokio::test]
async fn shutdown_handle_stops_the_runtime() {
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stopped);

    let runtime = ServiceRuntime::new("test-service")
        .with_config(RuntimeConfig::new().with_shutdown_timeout(Duration::from_secs(2)))
        .add_spawn_with_shutdown("server", move |shutdown_rx| async move {
            let _ = shutdown_rx.await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
    let handle = runtime.shutdown_handle();

    let run = tokio::spawn(runtime.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.trigger();

    let result = tokio::time::timeout(Duration::from_secs(3), run)
        .await
        .expect("runtime did not stop")
        .expect("runtime task panicked");
    tokio_test::assert_ok!(result);
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn first_task_exit_interrupts_the_group() {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);

    let runtime = ServiceRuntime::new("test-service")
        // 立即退出的任务会中断整个任务组
        .add_spawn("short-lived", async { Ok(()) })
        .add_spawn_with_shutdown("long-lived", move |shutdown_rx| async move {
            let _ = shutdown_rx.await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

    let result = tokio::time::timeout(Duration::from_secs(3), runtime.run())
        .await
        .expect("runtime did not stop");
    tokio_test::assert_ok!(result);
    assert!(interrupted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_task_still_shuts_the_group_down() {
    let runtime = ServiceRuntime::new("test-service")
        .add_spawn("broken", async { Err("worker crashed".into()) })
        .add_spawn_with_shutdown("steady", |shutdown_rx| async move {
            let _ = shutdown_rx.await;
            Ok(())
        });

    let result = tokio::time::timeout(Duration::from_secs(3), runtime.run())
        .await
        .expect("runtime did not stop");
    tokio_test::assert_ok!(result);
}

#[tokio::test]
async fn crontab_runs_as_a_runtime_task() {
    use ember_app_core::cron::Crontab;

    let crontab = Crontab::new();
    let runtime = ServiceRuntime::new("test-service").add_task(Box::new(crontab));
    assert_eq!(runtime.task_count(), 1);

    let handle = runtime.shutdown_handle();
    let run = tokio::spawn(runtime.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.trigger();

    let result = tokio::time::timeout(Duration::from_secs(3), run)
        .await
        .expect("runtime did not stop")
        .expect("runtime task panicked");
    tokio_test::assert_ok!(result);
}
