use serde::{Deserialize, Serialize};

/// 调度线程池配置
///
/// 核心工作者常驻；队列满时临时扩容到 `max_workers`；
/// 两者都耗尽时由提交方同步执行。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// 临时工作者空闲多久后退出
    pub keep_alive_seconds: u64,
    /// 优雅关闭等待在途任务的最长时间，超时后强制关闭
    pub shutdown_timeout_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            core_workers: 10,
            max_workers: 30,
            queue_capacity: 500,
            keep_alive_seconds: 60,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.core_workers == 0 {
            return Err(anyhow::anyhow!("核心工作者数必须大于0"));
        }

        if self.max_workers < self.core_workers {
            return Err(anyhow::anyhow!(
                "最大工作者数 {} 不能小于核心工作者数 {}",
                self.max_workers,
                self.core_workers
            ));
        }

        if self.queue_capacity == 0 {
            return Err(anyhow::anyhow!("任务队列容量必须大于0"));
        }

        Ok(())
    }
}

/// 执行器传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub execute_path: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            execute_path: "/tesseract-executor/execute".to_string(),
            connect_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.execute_path.starts_with('/') {
            return Err(anyhow::anyhow!(
                "执行路径必须以 / 开头: {}",
                self.execute_path
            ));
        }

        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("超时时间必须大于0"));
        }

        if self.connect_timeout_ms > self.request_timeout_ms {
            return Err(anyhow::anyhow!("连接超时不能大于请求超时"));
        }

        Ok(())
    }
}
