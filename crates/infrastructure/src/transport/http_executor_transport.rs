//! 基于 HTTP 的执行器客户端
//!
//! 所有故障（地址非法、连接失败、超时、非 2xx、响应体无法解析）
//! 都被归一化为 `FAIL` 响应，调用方只需要看响应状态。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tesseract_core::{
    ExecutorRequest, ExecutorResponse, ExecutorTransport, SchedulerError, SchedulerResult,
    TransportConfig,
};
use tracing::{debug, Instrument};
use url::Url;

use crate::observability::{DispatchTracer, MetricsCollector};

pub struct HttpExecutorTransport {
    http_client: reqwest::Client,
    execute_path: String,
    metrics: MetricsCollector,
}

impl HttpExecutorTransport {
    pub fn new(config: &TransportConfig) -> SchedulerResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            http_client,
            execute_path: config.execute_path.clone(),
            metrics: MetricsCollector::new(),
        })
    }

    /// 机器地址可以带协议，不带时按 http 处理；地址中的上下文路径保留在执行路径之前
    pub fn execute_url(&self, address: &str) -> Result<Url, String> {
        let base = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let mut url =
            Url::parse(&base).map_err(|e| format!("invalid executor address {address}: {e}"))?;
        if url.host_str().is_none() {
            return Err(format!("invalid executor address {address}: missing host"));
        }
        let path = format!("{}{}", url.path().trim_end_matches('/'), self.execute_path);
        url.set_path(&path);
        Ok(url)
    }

    async fn post(&self, url: Url, request: &ExecutorRequest) -> ExecutorResponse {
        let response = match self.http_client.post(url.clone()).json(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return ExecutorResponse::fail(format!("request to {url} timed out: {e}"));
            }
            Err(e) => {
                return ExecutorResponse::fail(format!("failed to reach executor {url}: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ExecutorResponse::fail(format!("executor returned HTTP {status}: {body}"));
        }

        match response.json::<ExecutorResponse>().await {
            Ok(parsed) => parsed,
            Err(e) => ExecutorResponse::fail(format!("unreadable executor response: {e}")),
        }
    }
}

#[async_trait]
impl ExecutorTransport for HttpExecutorTransport {
    async fn send(&self, address: &str, request: &ExecutorRequest) -> ExecutorResponse {
        let url = match self.execute_url(address) {
            Ok(url) => url,
            Err(message) => return ExecutorResponse::fail(message),
        };

        let started = Instant::now();
        let response = self
            .post(url, request)
            .instrument(DispatchTracer::transport_span(address, request.log_id))
            .await;
        self.metrics
            .record_transport_duration(started.elapsed().as_secs_f64());

        debug!(
            "执行器响应: {} -> {:?} ({}ms)",
            address,
            response.status,
            started.elapsed().as_millis()
        );
        response
    }
}
