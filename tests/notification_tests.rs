//! 请假、考勤与通知集成测试

use axum::http::{Method, StatusCode};
use school_system::models::notification::{NotificationPriority, NotificationType};
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{TestApp, TestUser};

struct School {
    app: TestApp,
    admin: TestUser,
    teacher: TestUser,
    parent: TestUser,
}

async fn school() -> School {
    let app = TestApp::new().await;
    let tenant = app.tenant("Green Valley").await;
    let admin = app.user(tenant.id, "admin@gv.test", &["Administrator"]).await;
    let teacher = app.user(tenant.id, "teacher@gv.test", &["Teacher"]).await;
    let parent = app.user(tenant.id, "parent@gv.test", &["Parent"]).await;
    School {
        app,
        admin,
        teacher,
        parent,
    }
}

fn leave_body(is_emergency: bool) -> Value {
    json!({
        "leaveType": "SICK",
        "startDate": "2024-03-04",
        "endDate": "2024-03-05",
        "reason": "Fever",
        "isEmergency": is_emergency,
    })
}

async fn submit_leave(s: &School, is_emergency: bool) -> String {
    let (status, json) = s
        .app
        .post("/api/v1/leave-requests", &s.parent.token, leave_body(is_emergency))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "PENDING");
    json["data"]["id"].as_str().unwrap().to_string()
}

async fn create_student(s: &School, name: &str) -> String {
    let (status, json) = s
        .app
        .post(
            "/api/v1/students",
            &s.admin.token,
            json!({ "name": name, "className": "4B" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    json["data"]["id"].as_str().unwrap().to_string()
}

async fn link_parent(s: &School, student_id: &str, name: &str, user_id: Option<Uuid>) {
    let (status, _) = s
        .app
        .post(
            &format!("/api/v1/students/{}/parents", student_id),
            &s.admin.token,
            json!({ "name": name, "relationship": "guardian", "userId": user_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ==================== 请假通知 ====================

#[tokio::test]
async fn test_emergency_leave_notifies_requester_with_high_priority() {
    let s = school().await;
    let leave_id = submit_leave(&s, true).await;

    let (status, json) = s
        .app
        .post(
            &format!("/api/v1/leave-requests/{}/approve", leave_id),
            &s.admin.token,
            json!({ "comment": "Get well soon" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "APPROVED");
    assert_eq!(json["data"]["reviewedBy"], s.admin.id.to_string());

    let notifications = s.app.store.all_notifications().await;
    assert_eq!(notifications.len(), 2);
    for n in &notifications {
        assert_eq!(n.user_id, s.parent.id);
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.data["leaveRequestId"], leave_id.as_str());
    }
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationType::LeaveRequest));
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationType::LeaveApproved));
}

#[tokio::test]
async fn test_regular_leave_uses_normal_priority() {
    let s = school().await;
    let leave_id = submit_leave(&s, false).await;

    let (status, _) = s
        .app
        .post(
            &format!("/api/v1/leave-requests/{}/reject", leave_id),
            &s.admin.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let notifications = s.app.store.all_notifications().await;
    assert_eq!(notifications.len(), 2);
    assert!(notifications
        .iter()
        .all(|n| n.priority == NotificationPriority::Normal));
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationType::LeaveRejected));
}

#[tokio::test]
async fn test_leave_reviewed_only_once() {
    let s = school().await;
    let leave_id = submit_leave(&s, false).await;
    let approve = format!("/api/v1/leave-requests/{}/approve", leave_id);
    let reject = format!("/api/v1/leave-requests/{}/reject", leave_id);

    let (status, _) = s.app.post(&approve, &s.admin.token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = s.app.post(&approve, &s.admin.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = s.app.post(&reject, &s.admin.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 只有提交和第一次审批产生通知
    assert_eq!(s.app.store.all_notifications().await.len(), 2);
}

#[tokio::test]
async fn test_review_requires_approve_permission() {
    let s = school().await;
    let leave_id = submit_leave(&s, false).await;

    let (status, _) = s
        .app
        .post(
            &format!("/api/v1/leave-requests/{}/approve", leave_id),
            &s.teacher.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_leave_visibility() {
    let s = school().await;
    let leave_id = submit_leave(&s, false).await;
    let (status, _) = s
        .app
        .post("/api/v1/leave-requests", &s.teacher.token, leave_body(false))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, own) = s.app.get("/api/v1/leave-requests", &s.parent.token).await;
    assert_eq!(own["data"].as_array().unwrap().len(), 1);

    let (_, all) = s.app.get("/api/v1/leave-requests", &s.admin.token).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let (status, _) = s
        .app
        .get(&format!("/api/v1/leave-requests/{}", leave_id), &s.teacher.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_leave_date_range_validated() {
    let s = school().await;

    let (status, _) = s
        .app
        .post(
            "/api/v1/leave-requests",
            &s.parent.token,
            json!({
                "leaveType": "SICK",
                "startDate": "2024-03-05",
                "endDate": "2024-03-04",
                "reason": "Fever",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(s.app.store.all_notifications().await.is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_block_review() {
    let s = school().await;
    let leave_id = submit_leave(&s, true).await;

    s.app.store.set_fail_notification_writes(true);
    let (status, json) = s
        .app
        .post(
            &format!("/api/v1/leave-requests/{}/approve", leave_id),
            &s.admin.token,
            json!({}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "APPROVED");
    assert_eq!(s.app.store.all_notifications().await.len(), 1);
}

// ==================== 考勤提醒 ====================

#[tokio::test]
async fn test_absence_alerts_parents_with_accounts() {
    let s = school().await;
    let tenant_id = s.parent.tenant_id;
    let second = s.app.user(tenant_id, "dad@gv.test", &["Parent"]).await;
    let student_id = create_student(&s, "Mia").await;
    link_parent(&s, &student_id, "Mom", Some(s.parent.id)).await;
    link_parent(&s, &student_id, "Dad", Some(second.id)).await;
    link_parent(&s, &student_id, "Grandma", None).await;

    let (status, json) = s
        .app
        .post(
            "/api/v1/attendance",
            &s.teacher.token,
            json!({ "studentId": student_id, "date": "2024-03-04", "status": "ABSENT" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["notifiedParents"], 2);

    let notifications = s.app.store.all_notifications().await;
    assert_eq!(notifications.len(), 2);
    let mut recipients: Vec<Uuid> = notifications.iter().map(|n| n.user_id).collect();
    recipients.sort();
    let mut expected = vec![s.parent.id, second.id];
    expected.sort();
    assert_eq!(recipients, expected);
    for n in &notifications {
        assert_eq!(n.kind, NotificationType::AttendanceAlert);
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.data["studentId"], student_id.as_str());
    }
}

#[tokio::test]
async fn test_late_alert_is_normal_and_present_is_silent() {
    let s = school().await;
    let student_id = create_student(&s, "Leo").await;
    link_parent(&s, &student_id, "Mom", Some(s.parent.id)).await;

    let (_, late) = s
        .app
        .post(
            "/api/v1/attendance",
            &s.teacher.token,
            json!({ "studentId": student_id, "date": "2024-03-04", "status": "LATE" }),
        )
        .await;
    assert_eq!(late["notifiedParents"], 1);

    // 同一天再次标记会覆盖原记录
    let (_, present) = s
        .app
        .post(
            "/api/v1/attendance",
            &s.teacher.token,
            json!({ "studentId": student_id, "date": "2024-03-04", "status": "PRESENT" }),
        )
        .await;
    assert_eq!(present["notifiedParents"], 0);

    let notifications = s.app.store.all_notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].priority, NotificationPriority::Normal);

    let (_, records) = s
        .app
        .get(
            &format!("/api/v1/attendance?studentId={}", student_id),
            &s.teacher.token,
        )
        .await;
    let records = records["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "PRESENT");
}

#[tokio::test]
async fn test_attendance_for_unknown_student_is_404() {
    let s = school().await;

    let (status, _) = s
        .app
        .post(
            "/api/v1/attendance",
            &s.teacher.token,
            json!({ "studentId": Uuid::new_v4(), "date": "2024-03-04", "status": "ABSENT" }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==================== 通知接口 ====================

#[tokio::test]
async fn test_notifications_visible_only_to_recipient() {
    let s = school().await;
    submit_leave(&s, false).await;
    submit_leave(&s, true).await;

    let (status, mine) = s.app.get("/api/v1/notifications", &s.parent.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 2);
    assert_eq!(mine["unreadCount"], 2);

    let (_, theirs) = s.app.get("/api/v1/notifications", &s.teacher.token).await;
    assert!(theirs["data"].as_array().unwrap().is_empty());

    let id = mine["data"][0]["id"].as_str().unwrap().to_string();
    let read_uri = format!("/api/v1/notifications/{}/read", id);

    let (status, _) = s
        .app
        .request(Method::PUT, &read_uri, Some(&s.teacher.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = s
        .app
        .request(
            Method::DELETE,
            &format!("/api/v1/notifications/{}", id),
            Some(&s.teacher.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, read) = s
        .app
        .request(Method::PUT, &read_uri, Some(&s.parent.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["data"]["isRead"], true);

    let (_, count) = s
        .app
        .get("/api/v1/notifications/unread-count", &s.parent.token)
        .await;
    assert_eq!(count["unreadCount"], 1);
}

#[tokio::test]
async fn test_mark_all_read_and_delete() {
    let s = school().await;
    submit_leave(&s, false).await;
    submit_leave(&s, false).await;

    let (status, json) = s
        .app
        .request(
            Method::PUT,
            "/api/v1/notifications/read-all",
            Some(&s.parent.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["updated"], 2);

    let (_, unread) = s
        .app
        .get("/api/v1/notifications?unreadOnly=true", &s.parent.token)
        .await;
    assert!(unread["data"].as_array().unwrap().is_empty());

    let (_, all) = s.app.get("/api/v1/notifications", &s.parent.token).await;
    let id = all["data"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = s
        .app
        .request(
            Method::DELETE,
            &format!("/api/v1/notifications/{}", id),
            Some(&s.parent.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = s.app.get("/api/v1/notifications", &s.parent.token).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}
