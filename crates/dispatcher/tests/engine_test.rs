use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tesseract_core::{
    DispatcherConfig, ExecutorRequest, ExecutorResponse, ExecutorTransport, LogStatus,
    CREATOR_MANUAL, CREATOR_SCHEDULER, MSG_NO_LIVE_MACHINE, MSG_NO_RUNNABLE_JOB,
    MSG_NO_USABLE_EXECUTOR, MSG_WAITING_FOR_EXECUTOR, NULL_ADDRESS,
};
use tesseract_testing_utils::{MockExecutorTransport, MockRepositories, TestEnv, TriggerBuilder};

use tesseract_dispatcher::{
    DispatchOutcome, DispatchRepositories, Resolution, Submission, TriggerDispatcher,
};

fn repositories(repos: &MockRepositories) -> DispatchRepositories {
    DispatchRepositories {
        triggers: repos.triggers.clone(),
        jobs: repos.jobs.clone(),
        executors: repos.executors.clone(),
        endpoints: repos.endpoints.clone(),
        logs: repos.logs.clone(),
        fired: repos.fired.clone(),
    }
}

fn dispatcher(
    repos: &MockRepositories,
    transport: Arc<dyn ExecutorTransport>,
    config: DispatcherConfig,
) -> TriggerDispatcher {
    TriggerDispatcher::new(repositories(repos), transport, &config)
}

fn small_pool() -> DispatcherConfig {
    DispatcherConfig {
        core_workers: 2,
        max_workers: 4,
        queue_capacity: 16,
        keep_alive_seconds: 1,
        shutdown_timeout_seconds: 5,
    }
}

#[tokio::test]
async fn test_accepted_dispatch_waits_for_callback() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    let (trigger, endpoints) = repos
        .seed_dispatchable("t1", "hash", &["10.0.0.1:8081"])
        .await
        .unwrap();
    let engine = dispatcher(&repos, Arc::new(transport.clone()), small_pool());

    let outcome = engine.dispatch_one(trigger.clone(), false).await;
    let DispatchOutcome::Pending(log) = outcome else {
        panic!("expected pending, got {outcome:?}");
    };
    assert_eq!(log.status, LogStatus::Wait);
    assert_eq!(log.address, "10.0.0.1:8081");
    assert_eq!(log.message, MSG_WAITING_FOR_EXECUTOR);
    assert_eq!(log.creator, CREATOR_SCHEDULER);
    assert!(log.end_time.is_none());

    let fired = repos.store.fired_triggers();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].address, "10.0.0.1:8081");
    assert_eq!(fired[0].endpoint_id, endpoints[0].id);
    assert_eq!(fired[0].log_id, log.id);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].address, "10.0.0.1:8081");
    assert_eq!(requests[0].request.log_id, log.id);
    assert_eq!(requests[0].request.trigger_id, trigger.id);
    assert_eq!(requests[0].request.executor_id, trigger.executor_group_id);
    assert_eq!(requests[0].request.class_name, "demo.t1");
}

#[tokio::test]
async fn test_no_live_machine_fails_without_record() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    let (trigger, _) = repos.seed_dispatchable("t2", "hash", &[]).await.unwrap();
    let engine = dispatcher(&repos, Arc::new(transport.clone()), small_pool());

    let outcome = engine.dispatch_one(trigger, false).await;
    let DispatchOutcome::ConfigurationMissing(log) = outcome else {
        panic!("expected configuration missing, got {outcome:?}");
    };
    assert_eq!(log.status, LogStatus::Fail);
    assert_eq!(log.message, MSG_NO_LIVE_MACHINE);
    assert_eq!(log.address, NULL_ADDRESS);
    assert_eq!(log.class_name, "demo.t2");
    assert!(log.end_time.is_some());

    assert_eq!(repos.store.log_count(), 1);
    assert_eq!(repos.store.fired_count(), 0);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_missing_job_and_executor() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    let engine = dispatcher(&repos, Arc::new(transport.clone()), small_pool());

    let group = repos.add_group("g").await.unwrap();
    repos.add_endpoint(group.id, "w:1").await.unwrap();

    let no_job = repos
        .add_trigger(TriggerBuilder::new().with_name("no-job").with_executor_group(group.id).build())
        .await
        .unwrap();
    match engine.dispatch_one(no_job, true).await {
        DispatchOutcome::ConfigurationMissing(log) => {
            assert_eq!(log.message, MSG_NO_RUNNABLE_JOB);
            assert_eq!(log.class_name, "");
            assert_eq!(log.creator, CREATOR_MANUAL);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let no_group = repos
        .add_trigger(TriggerBuilder::new().with_name("no-group").with_executor_group(9999).build())
        .await
        .unwrap();
    repos.add_job(no_group.id, "demo.Orphan").await.unwrap();
    match engine.dispatch_one(no_group, false).await {
        DispatchOutcome::ConfigurationMissing(log) => {
            assert_eq!(log.message, MSG_NO_USABLE_EXECUTOR);
            assert_eq!(log.address, NULL_ADDRESS);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(repos.store.log_count(), 2);
    assert_eq!(repos.store.fired_count(), 0);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_transport_error_resolves_to_fail() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    transport.fail("10.0.0.3:8081", "connection refused by 10.0.0.3:8081");
    let (trigger, _) = repos
        .seed_dispatchable("t3", "round_robin", &["10.0.0.3:8081"])
        .await
        .unwrap();
    let engine = dispatcher(&repos, Arc::new(transport), small_pool());

    let outcome = engine.dispatch_one(trigger, false).await;
    let DispatchOutcome::TransportFailure(log) = outcome else {
        panic!("expected transport failure, got {outcome:?}");
    };
    assert_eq!(log.status, LogStatus::Fail);
    assert!(log.message.contains("connection refused"));
    assert!(log.end_time.is_some());
    assert_eq!(repos.store.fired_count(), 0);
    assert_eq!(repos.store.log(log.id).unwrap().status, LogStatus::Fail);
}

#[tokio::test]
async fn test_fail_without_body_gets_diagnostic() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    transport.respond(
        "w:1",
        ExecutorResponse {
            status: tesseract_core::ResponseStatus::Fail,
            body: None,
        },
    );
    let (trigger, _) = repos.seed_dispatchable("quiet", "first", &["w:1"]).await.unwrap();
    let engine = dispatcher(&repos, Arc::new(transport), small_pool());

    match engine.dispatch_one(trigger, false).await {
        DispatchOutcome::TransportFailure(log) => assert!(log.message.contains("w:1")),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_callback_after_wait_resolves_once() {
    let repos = MockRepositories::new();
    let (trigger, endpoints) = repos
        .seed_dispatchable("t4", "hash", &["10.0.0.4:8081"])
        .await
        .unwrap();
    let engine = dispatcher(&repos, Arc::new(MockExecutorTransport::new()), small_pool());

    let DispatchOutcome::Pending(waiting) = engine.dispatch_one(trigger.clone(), false).await else {
        panic!("expected pending");
    };

    let done = waiting.clone().succeed(Some("finished".to_string())).unwrap();
    let first = engine
        .tracker()
        .resolve_success_externally(trigger.id, endpoints[0].id, done.clone())
        .await
        .unwrap();
    assert!(first.is_resolved());

    let stored = repos.store.log(waiting.id).unwrap();
    assert_eq!(stored.status, LogStatus::Success);
    assert_eq!(stored.message, "finished");
    assert!(stored.end_time.is_some());
    assert_eq!(repos.store.fired_count(), 0);

    let again = engine
        .tracker()
        .resolve_success_externally(trigger.id, endpoints[0].id, done)
        .await
        .unwrap();
    assert_eq!(again, Resolution::AlreadyResolved);
    assert_eq!(repos.store.log(waiting.id).unwrap().message, "finished");
}

#[tokio::test]
async fn test_storage_failure_is_contained() {
    let repos = MockRepositories::new();
    let (trigger, _) = repos.seed_dispatchable("broken", "hash", &["w:1"]).await.unwrap();
    let engine = dispatcher(&repos, Arc::new(MockExecutorTransport::new()), small_pool());

    repos.store.fail_writes(true);
    let outcome = engine.dispatch_one(trigger, false).await;
    assert!(matches!(outcome, DispatchOutcome::Aborted(_)));
    assert_eq!(repos.store.log_count(), 0);
}

#[tokio::test]
async fn test_batch_dispatch_keeps_triggers_independent() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    transport.fail("bad:1", "unreachable");

    let mut triggers = Vec::new();
    for i in 0..20 {
        let address = if i % 4 == 0 { "bad:1" } else { "good:1" };
        let (trigger, _) = repos
            .seed_dispatchable(&format!("batch-{i}"), "hash", &[address])
            .await
            .unwrap();
        triggers.push(trigger);
    }
    let (lonely, _) = repos.seed_dispatchable("lonely", "hash", &[]).await.unwrap();
    triggers.push(lonely);

    let engine = dispatcher(&repos, Arc::new(transport.clone()), small_pool());
    engine.dispatch_batch(triggers, false).await;

    let store = repos.store.clone();
    assert!(
        TestEnv::wait_for(
            || {
                let store = store.clone();
                async move {
                    store.logs().iter().filter(|l| l.status != LogStatus::Init).count() == 21
                }
            },
            Duration::from_secs(5),
        )
        .await
    );

    let logs = repos.store.logs();
    assert_eq!(logs.len(), 21);
    let mut names: Vec<_> = logs.iter().map(|l| l.trigger_name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 21);

    let failed = logs.iter().filter(|l| l.status == LogStatus::Fail).count();
    let waiting = logs.iter().filter(|l| l.status == LogStatus::Wait).count();
    assert_eq!(failed, 6);
    assert_eq!(waiting, 15);
    assert_eq!(repos.store.fired_count(), 15);
    assert_eq!(transport.request_count(), 20);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_saturated_pool_runs_dispatch_inline() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    transport.set_delay(Duration::from_millis(200));

    let mut triggers = Vec::new();
    for i in 0..6 {
        let (trigger, _) = repos
            .seed_dispatchable(&format!("busy-{i}"), "hash", &["w:1"])
            .await
            .unwrap();
        triggers.push(trigger);
    }

    let config = DispatcherConfig {
        core_workers: 1,
        max_workers: 2,
        queue_capacity: 1,
        keep_alive_seconds: 1,
        shutdown_timeout_seconds: 5,
    };
    let engine = dispatcher(&repos, Arc::new(transport.clone()), config);

    // 1 个在执行、1 个排队、1 个临时工作者，其余只能在提交方执行
    let started = std::time::Instant::now();
    engine.dispatch_batch(triggers, false).await;
    assert!(
        started.elapsed() >= Duration::from_millis(200),
        "batch returned before any inline dispatch finished"
    );

    engine.shutdown().await;
    assert_eq!(transport.request_count(), 6);
    assert_eq!(repos.store.log_count(), 6);
    assert!(repos
        .store
        .logs()
        .iter()
        .all(|l| l.status == LogStatus::Wait));
}

#[tokio::test]
async fn test_dispatch_by_ids_skips_unknown() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    let (trigger, _) = repos.seed_dispatchable("by-id", "hash", &["w:1"]).await.unwrap();
    let engine = dispatcher(&repos, Arc::new(transport.clone()), small_pool());

    let found = engine.dispatch_by_ids(&[trigger.id, 424242], true).await.unwrap();
    assert_eq!(found, 1);

    engine.shutdown().await;
    let logs = repos.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].creator, CREATOR_MANUAL);
}

#[tokio::test]
async fn test_shutdown_now_leaves_in_flight_record() {
    let repos = MockRepositories::new();
    let transport = MockExecutorTransport::new();
    transport.set_delay(Duration::from_secs(30));
    let (trigger, _) = repos.seed_dispatchable("stuck", "hash", &["w:1"]).await.unwrap();

    let config = DispatcherConfig {
        core_workers: 1,
        max_workers: 1,
        queue_capacity: 8,
        keep_alive_seconds: 1,
        shutdown_timeout_seconds: 1,
    };
    let engine = dispatcher(&repos, Arc::new(transport), config);
    engine.dispatch_batch(vec![trigger.clone(), trigger], false).await;

    let store = repos.store.clone();
    assert!(
        TestEnv::wait_for(
            || {
                let store = store.clone();
                async move { store.fired_count() == 1 }
            },
            Duration::from_secs(5),
        )
        .await
    );

    let discarded = engine.shutdown_now().await;
    assert_eq!(discarded, 1);
    // 被中断的分发保留触发记录，等待人工对账
    assert_eq!(repos.store.fired_count(), 1);
    assert_eq!(repos.store.logs()[0].status, LogStatus::Init);
    assert_eq!(
        engine.pool().submit(Box::pin(async {})).await,
        Submission::Rejected
    );
}

/// 请求到达执行器后、响应返回前执行器已回调
struct CallbackFirstTransport {
    engine: tokio::sync::OnceCell<Arc<TriggerDispatcher>>,
    endpoint_id: i64,
    repos: MockRepositories,
    response: ExecutorResponse,
}

#[async_trait]
impl ExecutorTransport for CallbackFirstTransport {
    async fn send(&self, _address: &str, request: &ExecutorRequest) -> ExecutorResponse {
        let engine = self.engine.get().unwrap();
        let log = self.repos.store.log(request.log_id).unwrap();
        engine
            .tracker()
            .resolve_success_externally(
                request.trigger_id,
                self.endpoint_id,
                log.succeed(Some("fast".to_string())).unwrap(),
            )
            .await
            .unwrap();
        self.response.clone()
    }
}

#[tokio::test]
async fn test_callback_before_wait_is_not_overwritten() {
    let repos = MockRepositories::new();
    let (trigger, endpoints) = repos.seed_dispatchable("fast", "hash", &["w:1"]).await.unwrap();

    let transport = Arc::new(CallbackFirstTransport {
        engine: tokio::sync::OnceCell::new(),
        endpoint_id: endpoints[0].id,
        repos: repos.clone(),
        response: ExecutorResponse::success(),
    });
    let engine = Arc::new(dispatcher(&repos, transport.clone(), small_pool()));
    let _ = transport.engine.set(engine.clone());

    match engine.dispatch_one(trigger, false).await {
        DispatchOutcome::Pending(log) => {
            assert_eq!(log.status, LogStatus::Success);
            assert_eq!(log.message, "fast");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repos.store.fired_count(), 0);
    assert_eq!(repos.store.logs()[0].status, LogStatus::Success);
}

#[tokio::test]
async fn test_rejection_after_callback_keeps_final_log() {
    let repos = MockRepositories::new();
    let (trigger, endpoints) = repos.seed_dispatchable("late", "hash", &["w:1"]).await.unwrap();

    let transport = Arc::new(CallbackFirstTransport {
        engine: tokio::sync::OnceCell::new(),
        endpoint_id: endpoints[0].id,
        repos: repos.clone(),
        response: ExecutorResponse::fail("connection reset"),
    });
    let engine = Arc::new(dispatcher(&repos, transport.clone(), small_pool()));
    let _ = transport.engine.set(engine.clone());

    match engine.dispatch_one(trigger, false).await {
        DispatchOutcome::TransportFailure(log) => {
            assert_eq!(log.status, LogStatus::Success);
            assert_eq!(log.message, "fast");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(repos.store.fired_count(), 0);
    let logs = repos.store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Success);
    assert!(logs[0].end_time.is_some());
}
