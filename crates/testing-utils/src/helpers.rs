//! 异步测试常用的等待与日志初始化

use std::time::Duration;
use tokio::time::sleep;

pub struct TestEnv;

impl TestEnv {
    /// 轮询直到条件成立或超时
    ///
    /// 分发是异步提交的，测试需要等待队列中的任务执行完。
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition().await
    }

    /// 测试二进制里初始化一次日志，重复调用无副作用
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}
