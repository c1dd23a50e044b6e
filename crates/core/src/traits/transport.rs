use async_trait::async_trait;

use crate::models::{ExecutorRequest, ExecutorResponse};

/// 执行器传输接口
///
/// 实现必须把一切传输层故障（地址非法、连接失败、超时）转换为
/// `ExecutorResponse { status: Fail, body: 诊断信息 }`，不向调用方抛出错误。
#[async_trait]
pub trait ExecutorTransport: Send + Sync {
    async fn send(&self, address: &str, request: &ExecutorRequest) -> ExecutorResponse;
}
