use chrono::Duration;
use et_core::admin::guest_display_name;
use et_core::error::AppError;
use integration_tests::Harness;
use uuid::Uuid;

#[tokio::test]
async fn dashboard_requires_admin() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    h.thread_by(&ana, 2).await;

    let err = h.admin.dashboard(&ana).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn dashboard_counts_active_threads_and_members() {
    let h = Harness::new();
    let root = h.admin_user("root").await;
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let cy = h.user("cy").await;

    let short = h.thread_by(&cy, 1).await;
    let long = h.thread_by(&ana, 4).await;
    h.engine.request_join(long.id, &bo).await.unwrap();
    h.engine.resolve_request(long.id, bo.user_id, true, &ana).await.unwrap();

    let before = h.admin.dashboard(&root).await.unwrap();
    assert_eq!(before.total_threads, 2);
    assert_eq!(before.active_users, 3);
    assert_eq!(before.total_users, 4);

    h.clock.advance(Duration::minutes(90));
    let after = h.admin.dashboard(&root).await.unwrap();
    assert_eq!(after.total_threads, 1);
    assert_eq!(after.threads[0].thread.id, long.id);
    assert!(after.threads.iter().all(|t| t.thread.id != short.id));
    assert_eq!(after.active_users, 2);
    assert_eq!(after.total_users, 4);

    let mut names: Vec<_> = after.threads[0]
        .member_details
        .iter()
        .map(|m| m.username.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["ana".to_string(), "bo".to_string()]);
}

#[tokio::test]
async fn dashboard_includes_chat_for_every_thread() {
    let h = Harness::new();
    let root = h.admin_user("root").await;
    let ana = h.user("ana").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.post_message(thread.id, &ana, "admins can read this").await.unwrap();

    let dashboard = h.admin.dashboard(&root).await.unwrap();
    assert_eq!(dashboard.threads[0].thread.chat.len(), 1);

    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["totalThreads"], 1);
    assert_eq!(json["threads"][0]["memberDetails"][0]["username"], "ana");
    assert_eq!(json["threads"][0]["title"], "Coffee & Code");
}

#[tokio::test]
async fn unregistered_members_get_guest_names() {
    let h = Harness::new();
    let root = h.admin_user("root").await;
    let ana = h.user("ana").await;
    let ghost = et_core::session::Session {
        user_id: Uuid::now_v7(),
        username: "ghost".into(),
        is_admin: false,
    };
    let thread = h.thread_by(&ana, 2).await;
    h.engine.request_join(thread.id, &ghost).await.unwrap();
    let approved = h.engine.resolve_request(thread.id, ghost.user_id, true, &ana).await.unwrap();

    let guest = guest_display_name(ghost.user_id);
    assert!(guest.starts_with("User_"));
    assert_eq!(approved.chat[0].message, format!("{guest} joined the thread"));

    let dashboard = h.admin.dashboard(&root).await.unwrap();
    let details = &dashboard.threads[0].member_details;
    assert!(details.iter().any(|m| m.id == ghost.user_id && m.username == guest));
}

#[tokio::test]
async fn admin_delete_removes_thread() {
    let h = Harness::new();
    let root = h.admin_user("root").await;
    let ana = h.user("ana").await;
    let thread = h.thread_by(&ana, 2).await;

    let err = h.admin.delete_thread(thread.id, &ana).await.unwrap_err();
    assert!(
        matches!(err, AppError::Unauthorized(_)),
        "creators use the registry, not the admin path"
    );

    h.admin.delete_thread(thread.id, &root).await.unwrap();
    assert!(matches!(h.registry.get_by_id(thread.id).await, Err(AppError::NotFound(..))));
    assert_eq!(h.admin.dashboard(&root).await.unwrap().total_threads, 0);

    let err = h.admin.delete_thread(thread.id, &root).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(..)));
}
