//! 授权集成测试：OR 语义、角色并集、租户闸门

use axum::http::{Method, StatusCode};
use school_system::{
    auth::AuthContext,
    authz::PermissionPolicy,
    error::AppError,
    models::role::CreateRoleRequest,
    repository::RoleRepository,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::TestApp;

fn context(user_id: Uuid, tenant_id: Uuid) -> AuthContext {
    AuthContext {
        user_id,
        tenant_id,
        email: "someone@school.test".to_string(),
        name: "Someone".to_string(),
        roles: Vec::new(),
    }
}

async fn permission_ids(app: &TestApp, names: &[&str]) -> Vec<Uuid> {
    let roles: &Arc<dyn RoleRepository> = &app.state.repos.roles;
    let mut ids = Vec::new();
    for name in names {
        ids.push(
            roles
                .find_permission_by_name(name)
                .await
                .unwrap()
                .unwrap()
                .id,
        );
    }
    ids
}

#[tokio::test]
async fn test_any_of_accepts_manage_without_read() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;

    let librarian = app
        .state
        .role_service
        .create_role(
            tenant.id,
            CreateRoleRequest {
                name: "Librarian".to_string(),
                description: None,
                permission_ids: permission_ids(&app, &["library:manage"]).await,
            },
        )
        .await
        .unwrap();
    let user = app.user(tenant.id, "books@gv.test", &[]).await;
    app.state
        .role_service
        .assign_role(tenant.id, user.id, librarian.role.id)
        .await
        .unwrap();

    let ctx = context(user.id, tenant.id);
    let policy = PermissionPolicy::any_of(["library:read", "library:manage"]);
    assert!(app
        .state
        .permission_service
        .authorize(&ctx, &policy)
        .await
        .is_ok());

    let strict = PermissionPolicy::all_of(["library:read", "library:manage"]);
    let err = app
        .state
        .permission_service
        .authorize(&ctx, &strict)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_effective_permissions_are_union_of_roles() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let user = app
        .user(tenant.id, "both@gv.test", &["Teacher", "Staff"])
        .await;

    let granted = app
        .state
        .permission_service
        .effective_permissions(tenant.id, user.id)
        .await
        .unwrap();

    // Teacher 独有 + Staff 独有
    assert!(granted.contains("attendance:mark"));
    assert!(granted.contains("billing:manage"));
    assert!(!granted.contains("roles:manage"));
}

#[tokio::test]
async fn test_user_without_permission_gets_403() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let parent = app.user(tenant.id, "parent@gv.test", &["Parent"]).await;

    let (status, json) = app.get("/api/v1/roles", &parent.token).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json["message"],
        "You do not have permission to perform this action"
    );
}

#[tokio::test]
async fn test_permissions_reread_on_every_request() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let admin = app.user(tenant.id, "admin@gv.test", &["Administrator"]).await;
    let user = app.user(tenant.id, "staff@gv.test", &[]).await;

    let (status, _) = app.get("/api/v1/users", &user.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 授予角色后，旧令牌立即生效
    let staff_admin = app.role_id(tenant.id, "Administrator").await;
    let (status, _) = app
        .post(
            &format!("/api/v1/users/{}/roles", user.id),
            &admin.token,
            json!({ "roleId": staff_admin }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.get("/api/v1/users", &user.token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_tenant_header_mismatch_is_rejected() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let other = app.tenant("Hill Side").await;
    let admin = app.user(tenant.id, "admin@gv.test", &["Administrator"]).await;
    let other_id = other.id.to_string();
    let own_id = tenant.id.to_string();

    let (status, json) = app
        .request_with_headers(
            Method::GET,
            "/api/v1/roles",
            Some(&admin.token),
            None,
            &[("x-tenant-id", other_id.as_str())],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "Access to another tenant is not allowed");

    let (status, _) = app
        .request_with_headers(
            Method::GET,
            "/api/v1/roles",
            Some(&admin.token),
            None,
            &[("x-tenant-id", own_id.as_str())],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_with_headers(
            Method::GET,
            "/api/v1/roles",
            Some(&admin.token),
            None,
            &[("x-tenant-id", "not-a-uuid")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_users_listing_is_tenant_scoped() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let other = app.tenant("Hill Side").await;
    let admin = app.user(tenant.id, "admin@gv.test", &["Administrator"]).await;
    app.user(other.id, "stranger@hs.test", &["Teacher"]).await;

    let (status, json) = app.get("/api/v1/users", &admin.token).await;

    assert_eq!(status, StatusCode::OK);
    let emails: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|u| u["email"].as_str())
        .collect();
    assert_eq!(emails, vec!["admin@gv.test"]);
}

#[tokio::test]
async fn test_create_user_rejects_foreign_role() {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let other = app.tenant("Hill Side").await;
    let admin = app.user(tenant.id, "admin@gv.test", &["Administrator"]).await;
    let foreign = app.role_id(other.id, "Administrator").await;

    let (status, json) = app
        .post(
            "/api/v1/users",
            &admin.token,
            json!({
                "email": "new@gv.test",
                "name": "New",
                "password": "Passw0rdXY",
                "roleIds": [foreign],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["errors"]["roleIds"].is_array());
}
