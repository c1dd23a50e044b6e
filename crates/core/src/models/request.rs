use serde::{Deserialize, Serialize};

/// 发往执行器的执行请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorRequest {
    pub class_name: String,
    pub sharding_index: i32,
    pub log_id: i64,
    pub trigger_id: i64,
    /// 执行器分组ID
    pub executor_id: i64,
}

/// 执行器响应状态，线上以 200 / 500 传输
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum ResponseStatus {
    Success,
    Fail,
}

impl ResponseStatus {
    pub const SUCCESS_CODE: i32 = 200;
    pub const FAIL_CODE: i32 = 500;
}

impl From<ResponseStatus> for i32 {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Success => ResponseStatus::SUCCESS_CODE,
            ResponseStatus::Fail => ResponseStatus::FAIL_CODE,
        }
    }
}

impl TryFrom<i32> for ResponseStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            ResponseStatus::SUCCESS_CODE => Ok(ResponseStatus::Success),
            ResponseStatus::FAIL_CODE => Ok(ResponseStatus::Fail),
            other => Err(format!("unknown executor response status: {other}")),
        }
    }
}

/// 执行器响应
///
/// `Success` 只表示执行器已接收并将执行，不表示任务已完成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl ExecutorResponse {
    pub fn success() -> Self {
        Self {
            status: ResponseStatus::Success,
            body: None,
        }
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Fail,
            body: Some(serde_json::Value::String(diagnostic.into())),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// 响应体的文本形式，字符串不带引号
    pub fn body_text(&self) -> Option<String> {
        match &self.body {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = ExecutorRequest {
            class_name: "demo.ReportJob".to_string(),
            sharding_index: 2,
            log_id: 11,
            trigger_id: 5,
            executor_id: 3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "className": "demo.ReportJob",
                "shardingIndex": 2,
                "logId": 11,
                "triggerId": 5,
                "executorId": 3
            })
        );
    }

    #[test]
    fn test_response_status_codes() {
        let ok: ExecutorResponse = serde_json::from_value(json!({"status": 200})).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.body_text(), None);

        let failed: ExecutorResponse =
            serde_json::from_value(json!({"status": 500, "body": "busy"})).unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.body_text().as_deref(), Some("busy"));

        assert!(serde_json::from_value::<ExecutorResponse>(json!({"status": 302})).is_err());
    }

    #[test]
    fn test_non_string_body_text() {
        let response = ExecutorResponse {
            status: ResponseStatus::Fail,
            body: Some(json!({"reason": "queue full"})),
        };
        assert_eq!(
            response.body_text().as_deref(),
            Some(r#"{"reason":"queue full"}"#)
        );
    }
}
