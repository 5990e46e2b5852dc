//! 审计日志服务
//!
//! 写入由审计中间件在响应结束后触发（不阻塞请求），读取供审计查询接口使用。

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::audit::*,
    repository::AuditRepository,
};

/// Replacement for every redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments (case-insensitive) whose values never reach the audit table
const SENSITIVE_KEY_FRAGMENTS: [&str; 5] = ["password", "token", "secret", "key", "auth"];

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
const STATS_TOP_N: i64 = 10;

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|f| key.contains(f))
}

/// 递归脱敏：对象中命中敏感关键字的字段整体替换，数组逐项处理
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if is_sensitive_key(&k) {
                        (k, Value::String(REDACTED.to_string()))
                    } else {
                        (k, redact(v))
                    }
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

/// HTTP 方法到审计动作
pub fn action_for_method(method: &Method) -> &'static str {
    match *method {
        Method::POST => "CREATE",
        Method::PUT | Method::PATCH => "UPDATE",
        Method::DELETE => "DELETE",
        _ => "READ",
    }
}

/// `/api/v1/{resource}/{id}/...` -> (resource, id)
pub fn resource_from_path(path: &str) -> (String, Option<String>) {
    let rest = path.strip_prefix("/api/v1/").unwrap_or(path);
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let resource = segments.next().unwrap_or("root").to_string();
    let resource_id = segments.next().map(str::to_string);
    (resource, resource_id)
}

/// Parsed, redacted body snapshot
///
/// `total_len` is the full body size; bodies larger than `max_bytes` are not
/// stored, only their size.
pub fn body_snapshot(captured: &[u8], total_len: usize, max_bytes: usize) -> Value {
    if total_len == 0 {
        return Value::Null;
    }
    if total_len > max_bytes {
        return serde_json::json!({ "truncated": true, "size": total_len });
    }
    match serde_json::from_slice::<Value>(captured) {
        Ok(value) => redact(value),
        Err(_) => Value::String(String::from_utf8_lossy(captured).into_owned()),
    }
}

/// 从响应体的 `message` / `error` 字段提取错误信息
pub fn error_message_from_body(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

pub struct AuditService {
    repo: Arc<dyn AuditRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// 写入一条审计日志
    pub async fn record(&self, entry: NewAuditLog) -> Result<AuditLog> {
        let log = entry.into_log();
        self.repo.insert(&log).await?;
        Ok(log)
    }

    /// 后台写入；失败只记日志和指标，不影响调用方
    pub fn record_detached(self: &Arc<Self>, entry: NewAuditLog) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(resource = %entry.resource, "No runtime available, audit entry dropped");
                metrics::counter!("audit_write_failures_total").increment(1);
                return;
            }
        };

        let service = Arc::clone(self);
        handle.spawn(async move {
            let action = entry.action.clone();
            let resource = entry.resource.clone();
            let user_id = entry.user_id;
            if let Err(e) = service.record(entry).await {
                metrics::counter!("audit_write_failures_total").increment(1);
                tracing::error!(
                    action = %action,
                    resource = %resource,
                    user_id = ?user_id,
                    error = %e,
                    "Failed to write audit log"
                );
            }
        });
    }

    /// 分页查询（limit 默认 50，最大 200）
    pub async fn query(&self, tenant_id: Uuid, query: &AuditLogQuery) -> Result<AuditPage> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);
        let filters = query.filters();

        let data = self.repo.query(tenant_id, &filters, limit, offset).await?;
        let total = self.repo.count(tenant_id, &filters).await?;

        Ok(AuditPage {
            data,
            total,
            limit,
            offset,
        })
    }

    pub async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<AuditLog> {
        self.repo
            .find(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Audit log"))
    }

    pub async fn stats(
        &self,
        tenant_id: Uuid,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<AuditStats> {
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end < start {
                return Err(AppError::invalid_field("endTime", "must not be before startTime"));
            }
        }
        self.repo.stats(tenant_id, start_time, end_time, STATS_TOP_N).await
    }
}
