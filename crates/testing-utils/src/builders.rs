//! 测试数据构建器

use crate::mocks::{
    MockExecutionLogRepository, MockExecutorDetailRepository, MockExecutorRepository,
    MockFiredTriggerRepository, MockJobDetailRepository, MockStore, MockTriggerRepository,
};
use std::sync::Arc;
use tesseract_core::{
    ExecutorDetailRepository, ExecutorGroup, ExecutorRepository, JobDetail, JobDetailRepository,
    SchedulerResult, Trigger, TriggerRepository, WorkerEndpoint,
};

pub struct TriggerBuilder {
    trigger: Trigger,
}

impl TriggerBuilder {
    pub fn new() -> Self {
        Self {
            trigger: Trigger::new(0, "test_trigger", 0, "hash"),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.trigger.name = name.to_string();
        self
    }

    pub fn with_executor_group(mut self, executor_group_id: i64) -> Self {
        self.trigger.executor_group_id = executor_group_id;
        self
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.trigger.routing_strategy = strategy.to_string();
        self
    }

    pub fn with_sharding_index(mut self, sharding_index: i32) -> Self {
        self.trigger.sharding_index = sharding_index;
        self
    }

    pub fn build(self) -> Trigger {
        self.trigger
    }
}

impl Default for TriggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 一组共享同一内存存储的仓储，外加播种数据的快捷方法
#[derive(Clone)]
pub struct MockRepositories {
    pub store: MockStore,
    pub triggers: Arc<MockTriggerRepository>,
    pub jobs: Arc<MockJobDetailRepository>,
    pub executors: Arc<MockExecutorRepository>,
    pub endpoints: Arc<MockExecutorDetailRepository>,
    pub logs: Arc<MockExecutionLogRepository>,
    pub fired: Arc<MockFiredTriggerRepository>,
}

impl MockRepositories {
    pub fn new() -> Self {
        let store = MockStore::new();
        Self {
            triggers: Arc::new(MockTriggerRepository::new(store.clone())),
            jobs: Arc::new(MockJobDetailRepository::new(store.clone())),
            executors: Arc::new(MockExecutorRepository::new(store.clone())),
            endpoints: Arc::new(MockExecutorDetailRepository::new(store.clone())),
            logs: Arc::new(MockExecutionLogRepository::new(store.clone())),
            fired: Arc::new(MockFiredTriggerRepository::new(store.clone())),
            store,
        }
    }

    pub async fn add_group(&self, name: &str) -> SchedulerResult<ExecutorGroup> {
        self.executors.create(&ExecutorGroup::new(name)).await
    }

    pub async fn add_endpoint(
        &self,
        executor_group_id: i64,
        address: &str,
    ) -> SchedulerResult<WorkerEndpoint> {
        self.endpoints
            .create(&WorkerEndpoint::new(executor_group_id, address))
            .await
    }

    pub async fn add_trigger(&self, trigger: Trigger) -> SchedulerResult<Trigger> {
        self.triggers.create(&trigger).await
    }

    pub async fn add_job(&self, trigger_id: i64, class_name: &str) -> SchedulerResult<JobDetail> {
        self.jobs.create(&JobDetail::new(trigger_id, class_name)).await
    }

    /// 播种一个可完整分发的触发器：分组、若干机器、触发器与任务
    pub async fn seed_dispatchable(
        &self,
        trigger_name: &str,
        strategy: &str,
        addresses: &[&str],
    ) -> SchedulerResult<(Trigger, Vec<WorkerEndpoint>)> {
        let group = self.add_group(&format!("{trigger_name}-group")).await?;
        let mut endpoints = Vec::with_capacity(addresses.len());
        for address in addresses {
            endpoints.push(self.add_endpoint(group.id, address).await?);
        }
        let trigger = self
            .add_trigger(
                TriggerBuilder::new()
                    .with_name(trigger_name)
                    .with_executor_group(group.id)
                    .with_strategy(strategy)
                    .build(),
            )
            .await?;
        self.add_job(trigger.id, &format!("demo.{trigger_name}"))
            .await?;
        Ok((trigger, endpoints))
    }
}

impl Default for MockRepositories {
    fn default() -> Self {
        Self::new()
    }
}
