//! Shared fixtures for the integration test suites.
//!
//! [`Harness`] wires the core services over the in-memory stores with a
//! [`ManualClock`] pinned to [`t0`], so expiry can be driven explicitly.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use et_core::admin::AdminProjection;
use et_core::engine::MembershipEngine;
use et_core::models::{Thread, ThreadDraft};
use et_core::registry::ThreadRegistry;
use et_core::session::Session;
use et_core::traits::{ManualClock, UserRepo};
use et_store_memory::{MemoryThreadRepo, MemoryUserRepo};

/// 2025-05-01T12:00:00Z
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub users: Arc<MemoryUserRepo>,
    pub registry: Arc<ThreadRegistry>,
    pub engine: MembershipEngine,
    pub admin: AdminProjection,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let users = Arc::new(MemoryUserRepo::new(clock.clone()));
        let threads = Arc::new(MemoryThreadRepo::new());
        let registry = Arc::new(ThreadRegistry::new(threads, clock.clone()));
        let engine = MembershipEngine::new(registry.clone(), users.clone());
        let admin = AdminProjection::new(registry.clone(), users.clone());
        Self {
            clock,
            users,
            registry,
            engine,
            admin,
        }
    }

    pub async fn user(&self, name: &str) -> Session {
        let user = self.users.get_or_create(name, false).await.unwrap();
        Session::from(&user)
    }

    pub async fn admin_user(&self, name: &str) -> Session {
        let user = self.users.get_or_create(name, true).await.unwrap();
        Session::from(&user)
    }

    pub async fn thread_by(&self, creator: &Session, hours: u32) -> Thread {
        self.registry.create_thread(creator, draft("Coffee & Code"), hours).await.unwrap()
    }
}

pub fn draft(title: &str) -> ThreadDraft {
    ThreadDraft {
        title: title.to_string(),
        description: "Casual coding over coffee".to_string(),
        location: "Starbucks Downtown".to_string(),
        tags: vec!["coffee".to_string(), "coding".to_string()],
    }
}

/// Asserts the membership invariants every committed thread must hold.
pub fn assert_invariants(thread: &Thread) {
    assert!(thread.expires_at > thread.created_at, "expiry must follow creation");
    assert!(thread.members.contains(&thread.creator_id), "creator must be a member");
    assert!(
        thread.members.is_disjoint(&thread.pending_requests),
        "members and pending requests overlap"
    );
    assert!(
        thread.chat.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "chat out of order"
    );
}
