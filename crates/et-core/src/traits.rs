//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::{Thread, ThreadId, User, UserId};
use crate::session::Session;

/// A change applied to a draft copy of one thread. Returning an error discards the draft.
pub type ThreadMutation = Box<dyn FnOnce(&mut Thread) -> Result<()> + Send>;

/// Persistence contract for threads.
///
/// Implementations must serialize `mutate` and `remove` per thread id, and
/// commit a mutation only when its closure returns `Ok`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn insert(&self, thread: Thread) -> Result<()>;
    async fn get(&self, id: ThreadId) -> Result<Option<Thread>>;
    /// All stored threads, expired ones included, newest first.
    async fn list(&self) -> Result<Vec<Thread>>;
    /// Applies `apply` atomically and returns the committed thread.
    /// Fails with `NotFound` when the id is unknown.
    async fn mutate(&self, id: ThreadId, apply: ThreadMutation) -> Result<Thread>;
    /// Removes the thread with its chat and membership sets.
    async fn remove(&self, id: ThreadId) -> Result<Option<Thread>>;
}

/// Persistence contract for registered users.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Returns the user registered under `username`, creating it with
    /// `is_admin` when absent.
    async fn get_or_create(&self, username: &str, is_admin: bool) -> Result<User>;
    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>>;
}

/// Credentials handed over by the transport layer at login.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub is_admin: bool,
}

/// Identity contract. Turns credentials into a trusted session.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, credentials: Credentials) -> Result<Session>;

    /// Resolves a previously issued user id back into a session.
    async fn session_for(&self, user_id: UserId) -> Result<Session>;
}

/// Source of "now" for expiry and message timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
