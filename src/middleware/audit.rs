//! 审计中间件
//!
//! 每个请求恰好一条审计记录。响应体按帧旁路复制（不改变内容与时序），
//! 响应体被释放（发送完毕或连接中断）时才组装记录并交给后台写入。

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::{client_ip, AppState};
use crate::{
    auth::AuthContext,
    error::AppError,
    models::audit::{AuditStatus, NewAuditLog},
    services::audit_service::{
        action_for_method, body_snapshot, error_message_from_body, resource_from_path,
        AuditService,
    },
};

/// Request-side facts collected before the handler runs
struct RequestFacts {
    method: Method,
    path: String,
    query: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    request_body: Value,
    started: Instant,
}

/// Watches the response body and writes the audit row when it is dropped
struct AuditRecorder {
    service: Arc<AuditService>,
    facts: Option<RequestFacts>,
    status: StatusCode,
    auth: Option<AuthContext>,
    captured: Vec<u8>,
    total_len: usize,
    max_bytes: usize,
}

impl AuditRecorder {
    fn capture(&mut self, chunk: &Bytes) {
        self.total_len += chunk.len();
        if self.total_len <= self.max_bytes {
            self.captured.extend_from_slice(chunk);
        }
    }

    fn build_entry(&mut self, facts: RequestFacts) -> NewAuditLog {
        let response_body = body_snapshot(&self.captured, self.total_len, self.max_bytes);
        let status = AuditStatus::from_http_status(self.status.as_u16());
        let error_message = match status {
            AuditStatus::Success => None,
            _ => error_message_from_body(&response_body)
                .or_else(|| self.status.canonical_reason().map(str::to_string)),
        };

        let (resource, resource_id) = resource_from_path(&facts.path);
        let details = json!({
            "method": facts.method.as_str(),
            "path": facts.path,
            "query": facts.query,
            "statusCode": self.status.as_u16(),
            "durationMs": facts.started.elapsed().as_millis() as u64,
            "requestBody": facts.request_body,
            "responseBody": response_body,
        });

        let auth = self.auth.take();
        NewAuditLog {
            user_id: auth.as_ref().map(|a| a.user_id),
            user_email: auth.as_ref().map(|a| a.email.clone()),
            user_name: auth.as_ref().map(|a| a.name.clone()),
            user_roles: auth.as_ref().map(|a| a.roles.clone()).unwrap_or_default(),
            tenant_id: auth.as_ref().map(|a| a.tenant_id),
            action: action_for_method(&facts.method).to_string(),
            resource,
            resource_id,
            details,
            ip_address: facts.ip_address,
            user_agent: facts.user_agent,
            status,
            error_message,
        }
    }
}

impl Drop for AuditRecorder {
    fn drop(&mut self) {
        if let Some(facts) = self.facts.take() {
            let entry = self.build_entry(facts);
            self.service.record_detached(entry);
        }
    }
}

/// 审计中间件，挂在认证层之外，从响应扩展读取认证上下文
pub async fn audit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if state.config.audit.is_excluded(&path) {
        return next.run(req).await;
    }

    let started = Instant::now();
    let max_bytes = state.config.audit.max_body_bytes;
    let ip_address = client_ip(&req, state.config.security.trust_proxy);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let method = req.method().clone();
    let query = req.uri().query().map(str::to_string);

    // 请求体需要完整读取后再交还给处理器
    let (parts, body) = req.into_parts();
    let (request_body, response) =
        match axum::body::to_bytes(body, state.config.security.max_request_body_bytes).await {
            Ok(bytes) => {
                let snapshot = body_snapshot(&bytes, bytes.len(), max_bytes);
                let req = Request::from_parts(parts, Body::from(bytes));
                (snapshot, next.run(req).await)
            }
            Err(e) => {
                tracing::debug!(error = %e, path = %path, "Request body rejected");
                let response =
                    AppError::BadRequest("Request body too large".to_string()).into_response();
                (Value::Null, response)
            }
        };

    let (parts, body) = response.into_parts();
    let mut recorder = AuditRecorder {
        service: state.audit_service.clone(),
        facts: Some(RequestFacts {
            method,
            path,
            query,
            ip_address,
            user_agent,
            request_body,
            started,
        }),
        status: parts.status,
        auth: parts.extensions.get::<AuthContext>().cloned(),
        captured: Vec::new(),
        total_len: 0,
        max_bytes,
    };

    let body = body.map_frame(move |frame| {
        if let Some(chunk) = frame.data_ref() {
            recorder.capture(chunk);
        }
        frame
    });

    Response::from_parts(parts, Body::new(body))
}
