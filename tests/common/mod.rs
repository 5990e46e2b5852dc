// 集成测试公共工具：内存存储 + 完整路由
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use school_system::{
    auth::jwt::TokenSubject,
    build_state_with,
    config::*,
    middleware::AppState,
    models::{
        audit::AuditLog,
        directory::{CreateTenantRequest, CreateUserRequest, Tenant},
    },
    repository::{MemoryStore, Repositories, RoleRepository},
    routes,
};
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rdXY";

/// 测试配置（内存后端、低成本 Argon2）
pub fn test_config() -> AppConfig {
    AppConfig {
        app: AppSection {
            environment: "production".to_string(),
        },
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            backend: "memory".to_string(),
            url: Secret::new(String::new()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test_secret_key_32_characters_long!".to_string()),
            access_token_exp_secs: 900,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_digit: true,
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            trust_proxy: true,
            allowed_ips: None,
            max_request_body_bytes: 1024 * 1024,
        },
        audit: AuditConfig {
            excluded_path_prefixes: vec!["/api/v1/audit-logs".to_string()],
            max_body_bytes: 16 * 1024,
        },
        bootstrap: BootstrapConfig {
            run_on_startup: true,
            manifest_path: None,
        },
    }
}

/// 已登录的测试用户
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    /// 完整应用，权限目录已同步
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = build_state_with(config, Repositories::from_memory(store.clone()))
            .expect("Failed to build app state");
        let report = state.bootstrapper.run_global().await;
        assert_eq!(report.failed, 0);

        let router = routes::create_router(state.clone());
        Self {
            state,
            store,
            router,
        }
    }

    /// 新租户，并同步默认角色
    pub async fn tenant(&self, name: &str) -> Tenant {
        let slug = name.to_lowercase().replace(' ', "-");
        let tenant = self
            .state
            .repos
            .directory
            .create_tenant(&CreateTenantRequest {
                name: name.to_string(),
                domain: format!("{}.school.test", slug),
                email: format!("office@{}.school.test", slug),
            })
            .await
            .expect("Failed to create tenant");
        let report = self.state.bootstrapper.run_for_tenant(tenant.id).await;
        assert_eq!(report.failed, 0);
        tenant
    }

    pub async fn role_id(&self, tenant_id: Uuid, name: &str) -> Uuid {
        let roles: &Arc<dyn RoleRepository> = &self.state.repos.roles;
        roles
            .find_role_by_name(tenant_id, name)
            .await
            .expect("Failed to look up role")
            .unwrap_or_else(|| panic!("role {} not seeded", name))
            .id
    }

    /// 创建用户并签发令牌
    pub async fn user(&self, tenant_id: Uuid, email: &str, roles: &[&str]) -> TestUser {
        let mut role_ids = Vec::new();
        for name in roles {
            role_ids.push(self.role_id(tenant_id, name).await);
        }

        let user = self
            .state
            .directory_service
            .create_user(
                tenant_id,
                CreateUserRequest {
                    email: email.to_string(),
                    name: email.split('@').next().unwrap_or(email).to_string(),
                    password: PASSWORD.to_string(),
                    role_ids,
                },
            )
            .await
            .expect("Failed to create user");

        let token = self.token_for(user.id, tenant_id, email, roles);
        TestUser {
            id: user.id,
            tenant_id,
            email: email.to_string(),
            token,
        }
    }

    pub fn token_for(&self, user_id: Uuid, tenant_id: Uuid, email: &str, roles: &[&str]) -> String {
        self.state
            .jwt_service
            .generate_access_token(TokenSubject {
                user_id,
                tenant_id,
                email,
                name: "Test User",
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .expect("Failed to issue token")
    }

    /// 发送请求，读完响应体（读完后才会触发审计写入）
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "school-tests/1.0");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// 审计写入在后台完成，轮询直到至少 `count` 条
    pub async fn wait_for_audit_logs(&self, count: usize) -> Vec<AuditLog> {
        for _ in 0..100 {
            let logs = self.store.all_audit_logs().await;
            if logs.len() >= count {
                return logs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.store.all_audit_logs().await
    }

    /// 确认后台没有再写入（用于断言“不记录”）
    pub async fn settled_audit_logs(&self) -> Vec<AuditLog> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.store.all_audit_logs().await
    }
}
