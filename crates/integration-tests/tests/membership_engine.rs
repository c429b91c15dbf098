use std::sync::Arc;

use chrono::Duration;
use et_core::error::AppError;
use et_core::events::ThreadEvent;
use et_core::membership::{MembershipStatus, Role};
use integration_tests::{assert_invariants, Harness};
use uuid::Uuid;

#[tokio::test]
async fn join_request_then_approval_adds_member_and_one_notice() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;

    let pending = h.engine.request_join(thread.id, &bo).await.unwrap();
    assert!(pending.pending_requests.contains(&bo.user_id));
    assert_eq!(
        h.engine.membership_status(thread.id, bo.user_id).await.unwrap(),
        MembershipStatus::Pending
    );

    let approved = h.engine.resolve_request(thread.id, bo.user_id, true, &ana).await.unwrap();
    assert!(approved.members.contains(&bo.user_id));
    assert!(approved.pending_requests.is_empty());
    assert_eq!(approved.chat.len(), 1);
    assert!(approved.chat[0].is_system());
    assert_eq!(approved.chat[0].message, "bo joined the thread");
    assert!(h.engine.is_member(thread.id, bo.user_id).await.unwrap());
    assert_invariants(&approved);
}

#[tokio::test]
async fn denial_clears_request_without_notice() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.request_join(thread.id, &bo).await.unwrap();

    let denied = h.engine.resolve_request(thread.id, bo.user_id, false, &ana).await.unwrap();
    assert!(!denied.members.contains(&bo.user_id));
    assert!(denied.pending_requests.is_empty());
    assert!(denied.chat.is_empty());

    // A denied user may ask again.
    h.engine.request_join(thread.id, &bo).await.unwrap();
}

#[tokio::test]
async fn duplicate_requests_conflict() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;

    h.engine.request_join(thread.id, &bo).await.unwrap();
    let err = h.engine.request_join(thread.id, &bo).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = h.engine.request_join(thread.id, &ana).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "creator is already a member");

    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert_eq!(stored.pending_requests.len(), 1);
}

#[tokio::test]
async fn only_the_creator_resolves_requests() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let cy = h.user("cy").await;
    let root = h.admin_user("root").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.request_join(thread.id, &bo).await.unwrap();

    for outsider in [&bo, &cy, &root] {
        let err = h
            .engine
            .resolve_request(thread.id, bo.user_id, true, outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)), "{}", outsider.username);
    }
    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert!(stored.pending_requests.contains(&bo.user_id));
    assert!(stored.chat.is_empty());
}

#[tokio::test]
async fn resolving_a_user_without_request_conflicts() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;

    let err = h.engine.resolve_request(thread.id, bo.user_id, true, &ana).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert!(!stored.members.contains(&bo.user_id));
    assert!(stored.chat.is_empty());
}

#[tokio::test]
async fn non_member_post_is_rejected_and_chat_unchanged() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.post_message(thread.id, &ana, "welcome").await.unwrap();

    let err = h.engine.post_message(thread.id, &bo, "let me in").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    h.engine.request_join(thread.id, &bo).await.unwrap();
    let err = h.engine.post_message(thread.id, &bo, "still waiting").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "pending users cannot post");

    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert_eq!(stored.chat.len(), 1);
}

#[tokio::test]
async fn member_posts_are_trimmed_and_ordered() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let thread = h.thread_by(&ana, 2).await;

    let first = h.engine.post_message(thread.id, &ana, "  hi all  ").await.unwrap();
    h.clock.advance(Duration::seconds(30));
    let second = h.engine.post_message(thread.id, &ana, "table by the window").await.unwrap();

    assert_eq!(first.message, "hi all");
    assert_eq!(first.user, "ana");
    assert_eq!(first.user_id, Some(ana.user_id));
    assert!(second.timestamp > first.timestamp);

    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    let ids: Vec<_> = stored.chat.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn blank_message_is_a_validation_error() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let thread = h.thread_by(&ana, 2).await;

    let err = h.engine.post_message(thread.id, &ana, " \t\n").await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(h.registry.get_by_id(thread.id).await.unwrap().chat.is_empty());
}

#[tokio::test]
async fn expired_thread_rejects_every_membership_change() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let cy = h.user("cy").await;
    let thread = h.thread_by(&ana, 1).await;
    h.engine.request_join(thread.id, &bo).await.unwrap();
    h.clock.advance(Duration::minutes(61));

    let not_found = |r: Result<_, AppError>| matches!(r, Err(AppError::NotFound(..)));
    assert!(not_found(h.engine.request_join(thread.id, &cy).await.map(|_| ())));
    let resolved = h.engine.resolve_request(thread.id, bo.user_id, true, &ana).await;
    assert!(not_found(resolved.map(|_| ())));
    assert!(not_found(h.engine.post_message(thread.id, &ana, "anyone?").await.map(|_| ())));

    // Status queries still answer for the stored thread.
    assert_eq!(
        h.engine.membership_status(thread.id, bo.user_id).await.unwrap(),
        MembershipStatus::Pending
    );
}

#[tokio::test]
async fn unknown_thread_is_not_found() {
    let h = Harness::new();
    let bo = h.user("bo").await;
    let err = h.engine.request_join(Uuid::now_v7(), &bo).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(..)));
}

#[tokio::test]
async fn views_hide_chat_from_outsiders() {
    let h = Harness::new();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let root = h.admin_user("root").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.post_message(thread.id, &ana, "hello").await.unwrap();
    h.engine.request_join(thread.id, &bo).await.unwrap();

    let creator = h.engine.view(thread.id, Some(&ana)).await.unwrap();
    assert_eq!(creator.role, Role::Creator);
    assert!(creator.can_view_chat);
    assert_eq!(creator.thread.chat.len(), 1);
    assert!(creator.thread.pending_requests.contains(&bo.user_id));

    let pending = h.engine.view(thread.id, Some(&bo)).await.unwrap();
    assert_eq!(pending.membership, MembershipStatus::Pending);
    assert!(!pending.can_view_chat);
    assert!(!pending.can_request_join);
    assert!(pending.thread.chat.is_empty());
    assert!(pending.thread.pending_requests.is_empty());

    let anonymous = h.engine.view(thread.id, None).await.unwrap();
    assert_eq!(anonymous.role, Role::Anonymous);
    assert!(anonymous.thread.chat.is_empty());
    assert!(anonymous.thread.pending_requests.is_empty());

    let admin = h.engine.view(thread.id, Some(&root)).await.unwrap();
    assert!(admin.can_view_chat);

    let listed = h.engine.list_active_views(Some(&bo)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].thread.chat.is_empty());
}

#[tokio::test]
async fn committed_changes_are_published() {
    let h = Harness::new();
    let mut events = h.registry.events().subscribe();
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 2).await;
    h.engine.request_join(thread.id, &bo).await.unwrap();
    h.engine.resolve_request(thread.id, bo.user_id, true, &ana).await.unwrap();
    h.engine.post_message(thread.id, &bo, "thanks").await.unwrap();
    // Rejected calls publish nothing.
    let _ = h.engine.request_join(thread.id, &bo).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            ThreadEvent::Created {
                thread_id: thread.id,
                creator_id: ana.user_id,
            },
            ThreadEvent::JoinRequested {
                thread_id: thread.id,
                user_id: bo.user_id,
            },
            ThreadEvent::RequestResolved {
                thread_id: thread.id,
                user_id: bo.user_id,
                approved: true,
            },
            ThreadEvent::MessagePosted {
                thread_id: thread.id,
                user_id: bo.user_id,
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_and_posts_keep_invariants() {
    let h = Arc::new(Harness::new());
    let ana = h.user("ana").await;
    let thread = h.thread_by(&ana, 8).await;

    let mut guests = Vec::new();
    for i in 0..16 {
        guests.push(h.user(&format!("guest{i}")).await);
    }

    let mut tasks = Vec::new();
    for guest in guests.clone() {
        let h = h.clone();
        let ana = ana.clone();
        tasks.push(tokio::spawn(async move {
            h.engine.request_join(thread.id, &guest).await.unwrap();
            h.engine.resolve_request(thread.id, guest.user_id, true, &ana).await.unwrap();
            h.engine.post_message(thread.id, &guest, "made it").await.unwrap();
            h.engine.post_message(thread.id, &ana, "welcome").await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert_invariants(&stored);
    assert_eq!(stored.members.len(), 17);
    assert!(stored.pending_requests.is_empty());
    assert_eq!(stored.chat.iter().filter(|m| m.is_system()).count(), 16);
    assert_eq!(stored.chat.len(), 48);
    for guest in &guests {
        let notice = format!("{} joined the thread", guest.username);
        assert_eq!(stored.chat.iter().filter(|m| m.message == notice).count(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn post_racing_a_denial_never_grants_membership() {
    let h = Arc::new(Harness::new());
    let ana = h.user("ana").await;
    let bo = h.user("bo").await;
    let thread = h.thread_by(&ana, 8).await;

    for _ in 0..64 {
        h.engine.request_join(thread.id, &bo).await.unwrap();

        let deny = {
            let (h, ana) = (h.clone(), ana.clone());
            let requester = bo.user_id;
            tokio::spawn(async move {
                h.engine.resolve_request(thread.id, requester, false, &ana).await
            })
        };
        let post = {
            let (h, bo) = (h.clone(), bo.clone());
            tokio::spawn(async move { h.engine.post_message(thread.id, &bo, "am I in?").await })
        };

        deny.await.unwrap().unwrap();
        let err = post.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)), "{err}");

        let stored = h.registry.get_by_id(thread.id).await.unwrap();
        assert_invariants(&stored);
        assert!(!stored.members.contains(&bo.user_id));
        assert!(!stored.pending_requests.contains(&bo.user_id));
    }

    let stored = h.registry.get_by_id(thread.id).await.unwrap();
    assert!(stored.chat.iter().all(|m| m.user_id != Some(bo.user_id)));
    assert!(stored.chat.is_empty());
}
