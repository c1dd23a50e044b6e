//! 仓储与传输接口的内存实现
//!
//! 所有仓储共享同一个 `MockStore`，一把锁保护全部表，
//! 因此 `create_with_log` / `remove_and_update_log` 天然原子。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tesseract_core::{
    ExecutionLog, ExecutionLogRepository, ExecutorDetailRepository, ExecutorGroup,
    ExecutorRepository, ExecutorRequest, ExecutorResponse, ExecutorTransport, FiredTrigger,
    FiredTriggerKey, FiredTriggerRepository, JobDetail, JobDetailRepository, LogStatus,
    SchedulerError, SchedulerResult, Trigger, TriggerRepository, WorkerEndpoint,
};

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    triggers: HashMap<i64, Trigger>,
    jobs: HashMap<i64, JobDetail>,
    groups: HashMap<i64, ExecutorGroup>,
    endpoints: HashMap<i64, WorkerEndpoint>,
    logs: HashMap<i64, ExecutionLog>,
    fired: HashMap<i64, FiredTrigger>,
}

impl StoreState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 所有内存仓储共享的存储
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的写操作全部返回数据库错误，用于验证存储故障不逃逸出分发任务
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    fn check_writable(&self) -> SchedulerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SchedulerError::DatabaseOperation(
                "mock store is read-only".to_string(),
            ));
        }
        Ok(())
    }

    pub fn logs(&self) -> Vec<ExecutionLog> {
        let state = self.state.lock().unwrap();
        let mut logs: Vec<_> = state.logs.values().cloned().collect();
        logs.sort_by_key(|log| log.id);
        logs
    }

    pub fn log(&self, id: i64) -> Option<ExecutionLog> {
        self.state.lock().unwrap().logs.get(&id).cloned()
    }

    pub fn fired_triggers(&self) -> Vec<FiredTrigger> {
        let state = self.state.lock().unwrap();
        let mut fired: Vec<_> = state.fired.values().cloned().collect();
        fired.sort_by_key(|f| f.id);
        fired
    }

    pub fn log_count(&self) -> usize {
        self.state.lock().unwrap().logs.len()
    }

    pub fn fired_count(&self) -> usize {
        self.state.lock().unwrap().fired.len()
    }
}

macro_rules! store_view {
    ($name:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            store: MockStore,
        }

        impl $name {
            pub fn new(store: MockStore) -> Self {
                Self { store }
            }
        }
    };
}

store_view!(MockTriggerRepository);
store_view!(MockJobDetailRepository);
store_view!(MockExecutorRepository);
store_view!(MockExecutorDetailRepository);
store_view!(MockExecutionLogRepository);
store_view!(MockFiredTriggerRepository);

#[async_trait]
impl TriggerRepository for MockTriggerRepository {
    async fn create(&self, trigger: &Trigger) -> SchedulerResult<Trigger> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let created = Trigger {
            id: state.allocate_id(),
            ..trigger.clone()
        };
        state.triggers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Trigger>> {
        Ok(self.store.state.lock().unwrap().triggers.get(&id).cloned())
    }

    async fn get_by_ids(&self, ids: &[i64]) -> SchedulerResult<Vec<Trigger>> {
        let state = self.store.state.lock().unwrap();
        let mut found: Vec<_> = ids
            .iter()
            .filter_map(|id| state.triggers.get(id).cloned())
            .collect();
        found.sort_by_key(|t| t.id);
        found.dedup_by_key(|t| t.id);
        Ok(found)
    }
}

#[async_trait]
impl JobDetailRepository for MockJobDetailRepository {
    async fn create(&self, job: &JobDetail) -> SchedulerResult<JobDetail> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let created = JobDetail {
            id: state.allocate_id(),
            ..job.clone()
        };
        state.jobs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Option<JobDetail>> {
        let state = self.store.state.lock().unwrap();
        Ok(state
            .jobs
            .values()
            .find(|job| job.trigger_id == trigger_id)
            .cloned())
    }
}

#[async_trait]
impl ExecutorRepository for MockExecutorRepository {
    async fn create(&self, group: &ExecutorGroup) -> SchedulerResult<ExecutorGroup> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let created = ExecutorGroup {
            id: state.allocate_id(),
            ..group.clone()
        };
        state.groups.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutorGroup>> {
        Ok(self.store.state.lock().unwrap().groups.get(&id).cloned())
    }
}

#[async_trait]
impl ExecutorDetailRepository for MockExecutorDetailRepository {
    async fn create(&self, endpoint: &WorkerEndpoint) -> SchedulerResult<WorkerEndpoint> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let created = WorkerEndpoint {
            id: state.allocate_id(),
            ..endpoint.clone()
        };
        state.endpoints.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_by_executor(
        &self,
        executor_group_id: i64,
    ) -> SchedulerResult<Vec<WorkerEndpoint>> {
        let state = self.store.state.lock().unwrap();
        let mut endpoints: Vec<_> = state
            .endpoints
            .values()
            .filter(|e| e.executor_group_id == executor_group_id)
            .cloned()
            .collect();
        endpoints.sort_by_key(|e| e.id);
        Ok(endpoints)
    }

    async fn delete(&self, id: i64) -> SchedulerResult<()> {
        self.store.check_writable()?;
        self.store.state.lock().unwrap().endpoints.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogRepository for MockExecutionLogRepository {
    async fn create(&self, log: &ExecutionLog) -> SchedulerResult<ExecutionLog> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let created = ExecutionLog {
            id: state.allocate_id(),
            ..log.clone()
        };
        state.logs.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<ExecutionLog>> {
        Ok(self.store.log(id))
    }

    async fn update_if_status(
        &self,
        log: &ExecutionLog,
        expected: LogStatus,
    ) -> SchedulerResult<bool> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        match state.logs.get_mut(&log.id) {
            Some(stored) if stored.status == expected => {
                *stored = log.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_trigger_name(&self, trigger_name: &str) -> SchedulerResult<Vec<ExecutionLog>> {
        Ok(self
            .store
            .logs()
            .into_iter()
            .filter(|log| log.trigger_name == trigger_name)
            .collect())
    }
}

#[async_trait]
impl FiredTriggerRepository for MockFiredTriggerRepository {
    async fn create_with_log(
        &self,
        log: &ExecutionLog,
        fired: &FiredTrigger,
    ) -> SchedulerResult<(ExecutionLog, FiredTrigger)> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let log = ExecutionLog {
            id: state.allocate_id(),
            ..log.clone()
        };
        let fired = FiredTrigger {
            id: state.allocate_id(),
            log_id: log.id,
            ..fired.clone()
        };
        state.logs.insert(log.id, log.clone());
        state.fired.insert(fired.id, fired.clone());
        Ok((log, fired))
    }

    async fn remove_and_update_log(
        &self,
        key: &FiredTriggerKey,
        log: &ExecutionLog,
    ) -> SchedulerResult<bool> {
        self.store.check_writable()?;
        let mut state = self.store.state.lock().unwrap();
        let Some(fired_id) = state
            .fired
            .values()
            .find(|f| f.key() == *key)
            .map(|f| f.id)
        else {
            return Ok(false);
        };
        state.fired.remove(&fired_id);
        state.logs.insert(log.id, log.clone());
        Ok(true)
    }

    async fn find(&self, key: &FiredTriggerKey) -> SchedulerResult<Option<FiredTrigger>> {
        let state = self.store.state.lock().unwrap();
        Ok(state.fired.values().find(|f| f.key() == *key).cloned())
    }

    async fn list_by_trigger_id(&self, trigger_id: i64) -> SchedulerResult<Vec<FiredTrigger>> {
        Ok(self
            .store
            .fired_triggers()
            .into_iter()
            .filter(|f| f.trigger_id == trigger_id)
            .collect())
    }

    async fn list(&self) -> SchedulerResult<Vec<FiredTrigger>> {
        Ok(self.store.fired_triggers())
    }
}

/// 一次收到的执行请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub address: String,
    pub request: ExecutorRequest,
}

/// 可编排的执行器传输
///
/// 未编排的地址默认返回成功。
#[derive(Debug, Clone, Default)]
pub struct MockExecutorTransport {
    responses: Arc<Mutex<HashMap<String, ExecutorResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockExecutorTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, address: &str, response: ExecutorResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(address.to_string(), response);
    }

    /// 模拟网络故障：与 HTTP 实现一样归一化为 FAIL
    pub fn fail(&self, address: &str, diagnostic: &str) {
        self.respond(address, ExecutorResponse::fail(diagnostic));
    }

    /// 每次发送前等待，用于构造饱和与取消场景
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutorTransport for MockExecutorTransport {
    async fn send(&self, address: &str, request: &ExecutorRequest) -> ExecutorResponse {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.requests.lock().unwrap().push(RecordedRequest {
            address: address.to_string(),
            request: request.clone(),
        });

        self.responses
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(ExecutorResponse::success)
    }
}
