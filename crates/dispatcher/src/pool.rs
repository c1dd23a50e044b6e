//! 分发线程池
//!
//! - `core_workers` 个常驻工作者从有界队列取任务
//! - 队列满时临时扩容到 `max_workers`，临时工作者空闲 `keep_alive` 后退出
//! - 两者都耗尽时由提交方直接执行，任务不会被丢弃
//! - 任务中的 panic 被捕获，工作者继续运行

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tesseract_core::DispatcherConfig;

pub type DispatchJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// 进入队列，由已有工作者执行
    Queued,
    /// 队列已满，新建了临时工作者执行
    Spawned,
    /// 线程池饱和，已在提交方执行完毕
    Inline,
    /// 线程池已关闭
    Rejected,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub keep_alive: Duration,
}

impl From<&DispatcherConfig> for PoolSettings {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            core_workers: config.core_workers,
            max_workers: config.max_workers.max(config.core_workers),
            queue_capacity: config.queue_capacity.max(1),
            keep_alive: Duration::from_secs(config.keep_alive_seconds),
        }
    }
}

struct PoolInner {
    settings: PoolSettings,
    sender: std::sync::Mutex<Option<mpsc::Sender<DispatchJob>>>,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    workers: Mutex<JoinSet<()>>,
    live_workers: AtomicUsize,
    shutdown: AtomicBool,
}

#[derive(Clone)]
pub struct DispatchPool {
    inner: Arc<PoolInner>,
}

impl DispatchPool {
    /// 创建线程池并启动常驻工作者，需要在 tokio 运行时内调用
    pub fn new(settings: PoolSettings) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let inner = Arc::new(PoolInner {
            sender: std::sync::Mutex::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            workers: Mutex::new(JoinSet::new()),
            live_workers: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            settings,
        });

        if let Ok(mut workers) = inner.workers.try_lock() {
            for worker_id in 0..inner.settings.core_workers {
                let live = LiveWorker::register(&inner);
                workers.spawn(run_worker(live, worker_id, None, None));
            }
        }

        info!(
            "分发线程池已启动: 核心 {}，最大 {}，队列 {}",
            inner.settings.core_workers, inner.settings.max_workers, inner.settings.queue_capacity
        );
        Self { inner }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    pub fn live_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::SeqCst)
    }

    /// 队列中尚未开始的任务数
    pub fn queued(&self) -> usize {
        let sender = self.inner.sender.lock().unwrap_or_else(|e| e.into_inner());
        sender
            .as_ref()
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0)
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, job: DispatchJob) -> Submission {
        if self.is_shutdown() {
            return Submission::Rejected;
        }

        let sender = {
            let guard = self.inner.sender.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return Submission::Rejected,
            }
        };

        let job = match sender.try_send(job) {
            Ok(()) => return Submission::Queued,
            Err(mpsc::error::TrySendError::Closed(_)) => return Submission::Rejected,
            Err(mpsc::error::TrySendError::Full(job)) => job,
        };
        drop(sender);

        match self.spawn_burst_worker(job).await {
            Ok(()) => Submission::Spawned,
            Err(job) => {
                if self.is_shutdown() {
                    return Submission::Rejected;
                }
                warn!(
                    "分发线程池已饱和 (工作者 {}，队列 {})，在提交方执行",
                    self.live_workers(),
                    self.inner.settings.queue_capacity
                );
                run_guarded(job).await;
                Submission::Inline
            }
        }
    }

    /// 工作者数未达上限时新建临时工作者，并把任务作为它的第一个任务
    async fn spawn_burst_worker(&self, job: DispatchJob) -> Result<(), DispatchJob> {
        let max = self.inner.settings.max_workers;
        let reserved = self
            .inner
            .live_workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live < max).then_some(live + 1)
            });
        let Ok(previous) = reserved else {
            return Err(job);
        };
        let live = LiveWorker(self.inner.clone());

        let mut workers = self.inner.workers.lock().await;
        if self.is_shutdown() {
            return Err(job);
        }
        while workers.try_join_next().is_some() {}
        workers.spawn(run_worker(
            live,
            previous,
            Some(self.inner.settings.keep_alive),
            Some(job),
        ));
        debug!("队列已满，新建临时工作者 #{}", previous);
        Ok(())
    }

    /// 优雅关闭：停止接收新任务，等待队列中与执行中的任务完成
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.close_queue();

        let mut workers = self.inner.workers.lock().await;
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("分发工作者异常退出: {}", e);
            }
        }
        info!("分发线程池已关闭");
    }

    /// 立即关闭：中止执行中的任务，丢弃队列中未开始的任务，返回丢弃数量
    pub async fn shutdown_now(&self) -> usize {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.close_queue();

        {
            let mut workers = self.inner.workers.lock().await;
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        let mut receiver = self.inner.receiver.lock().await;
        receiver.close();
        let mut discarded = 0;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }

        warn!("分发线程池已强制关闭，丢弃 {} 个未开始的任务", discarded);
        discarded
    }

    fn close_queue(&self) {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

/// `live` 随 future 一起移动，任务未被调度就被中止时同样归还计数
async fn run_worker(
    live: LiveWorker,
    worker_id: usize,
    keep_alive: Option<Duration>,
    first_job: Option<DispatchJob>,
) {
    let inner = live.0.clone();

    if let Some(job) = first_job {
        run_guarded(job).await;
    }

    loop {
        let next = match keep_alive {
            None => inner.receiver.lock().await.recv().await,
            Some(idle) => {
                let receive = async { inner.receiver.lock().await.recv().await };
                match tokio::time::timeout(idle, receive).await {
                    Ok(next) => next,
                    Err(_) => {
                        debug!("临时工作者 #{} 空闲超时退出", worker_id);
                        break;
                    }
                }
            }
        };

        match next {
            Some(job) => run_guarded(job).await,
            None => break,
        }
    }
}

/// 工作者退出或被中止时归还计数
struct LiveWorker(Arc<PoolInner>);

impl LiveWorker {
    fn register(inner: &Arc<PoolInner>) -> Self {
        inner.live_workers.fetch_add(1, Ordering::SeqCst);
        Self(inner.clone())
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.live_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_guarded(job: DispatchJob) {
    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("分发任务 panic: {}", message);
    }
}
