//! # et-store-memory
//!
//! In-process implementation of the `ThreadRepo` and `UserRepo` ports.
//!
//! # Developer Note
//! Each thread lives in its own `DashMap` entry. `mutate` holds that entry's
//! write guard while the closure runs against a draft copy, so all mutations
//! of one thread are serialized and a failed closure leaves no trace.
//! Threads in different shards never contend.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use et_core::error::{AppError, Result};
use et_core::models::{Thread, ThreadId, User, UserId};
use et_core::traits::{Clock, ThreadMutation, ThreadRepo, UserRepo};
use tracing::trace;

#[derive(Default)]
pub struct MemoryThreadRepo {
    threads: DashMap<ThreadId, Thread>,
}

impl MemoryThreadRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadRepo for MemoryThreadRepo {
    async fn insert(&self, thread: Thread) -> Result<()> {
        match self.threads.entry(thread.id) {
            Entry::Occupied(_) => {
                Err(AppError::Conflict(format!("thread {} already exists", thread.id)))
            }
            Entry::Vacant(slot) => {
                slot.insert(thread);
                Ok(())
            }
        }
    }

    async fn get(&self, id: ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.get(&id).map(|t| t.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.threads.iter().map(|t| t.value().clone()).collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    async fn mutate(&self, id: ThreadId, apply: ThreadMutation) -> Result<Thread> {
        let mut entry = self.threads.get_mut(&id).ok_or_else(|| AppError::thread_not_found(id))?;
        let mut draft = entry.value().clone();
        apply(&mut draft)?;
        *entry.value_mut() = draft.clone();
        trace!(thread_id = %id, "thread mutation committed");
        Ok(draft)
    }

    async fn remove(&self, id: ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.remove(&id).map(|(_, thread)| thread))
    }
}

pub struct MemoryUserRepo {
    users: DashMap<UserId, User>,
    /// username -> id
    by_name: DashMap<String, UserId>,
    clock: Arc<dyn Clock>,
}

impl MemoryUserRepo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: DashMap::new(),
            by_name: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn get(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let Some(id) = self.by_name.get(username).map(|id| *id) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn get_or_create(&self, username: &str, is_admin: bool) -> Result<User> {
        // The username entry stays locked until the user row exists, so two
        // first logins with one name cannot register twice.
        match self.by_name.entry(username.to_string()) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                self.users
                    .get(&id)
                    .map(|u| u.value().clone())
                    .ok_or_else(|| {
                        AppError::Internal(format!("username index points at missing user {id}"))
                    })
            }
            Entry::Vacant(slot) => {
                let user = User::new(username, is_admin, self.clock.now());
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}
