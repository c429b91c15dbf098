//! # Admin View Projection
//!
//! Read-only aggregation over the registry and the user store. The only
//! mutation it offers is a pass-through to [`ThreadRegistry::delete_thread`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{Thread, ThreadId, User, UserId};
use crate::registry::ThreadRegistry;
use crate::session::Session;
use crate::traits::UserRepo;

/// Fallback label for ids the user store does not know. Not unique.
pub fn guest_display_name(user_id: UserId) -> String {
    let simple = user_id.simple().to_string();
    format!("User_{}", &simple[simple.len() - 4..])
}

pub fn display_name_for(user_id: UserId, user: Option<&User>) -> String {
    user.map(|u| u.username.clone()).unwrap_or_else(|| guest_display_name(user_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDetail {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadWithMemberDetails {
    #[serde(flatten)]
    pub thread: Thread,
    pub member_details: Vec<MemberDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    /// Active threads only
    pub total_threads: usize,
    /// Users who are a member of at least one active thread
    pub active_users: usize,
    pub total_users: usize,
    pub threads: Vec<ThreadWithMemberDetails>,
    pub users: Vec<User>,
}

pub struct AdminProjection {
    registry: Arc<ThreadRegistry>,
    users: Arc<dyn UserRepo>,
}

impl AdminProjection {
    pub fn new(registry: Arc<ThreadRegistry>, users: Arc<dyn UserRepo>) -> Self {
        Self { registry, users }
    }

    pub async fn dashboard(&self, session: &Session) -> Result<AdminDashboard> {
        require_admin(session)?;

        let threads = self.registry.list_active().await?;
        let users = self.users.list().await?;
        let by_id: HashMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();

        let active_users: BTreeSet<UserId> =
            threads.iter().flat_map(|t| t.members.iter().copied()).collect();

        let threads: Vec<ThreadWithMemberDetails> = threads
            .into_iter()
            .map(|thread| {
                let member_details = thread
                    .members
                    .iter()
                    .map(|id| MemberDetail {
                        id: *id,
                        username: display_name_for(*id, by_id.get(id).copied()),
                    })
                    .collect();
                ThreadWithMemberDetails {
                    thread,
                    member_details,
                }
            })
            .collect();

        debug!(threads = threads.len(), users = users.len(), "admin dashboard composed");
        Ok(AdminDashboard {
            total_threads: threads.len(),
            active_users: active_users.len(),
            total_users: users.len(),
            threads,
            users,
        })
    }

    pub async fn delete_thread(&self, thread_id: ThreadId, session: &Session) -> Result<()> {
        require_admin(session)?;
        self.registry.delete_thread(thread_id, session).await
    }
}

fn require_admin(session: &Session) -> Result<()> {
    if !session.is_admin {
        return Err(AppError::Unauthorized("admin access required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use uuid::Uuid;

    use super::*;

    #[test]
    fn guest_name_uses_last_four_hex_digits() {
        let id = Uuid::from_str("0192f0a4-1b2c-7d3e-8f40-5a6b7c8d9e0f").unwrap();
        assert_eq!(guest_display_name(id), "User_9e0f");
    }

    #[test]
    fn known_users_resolve_to_their_username() {
        let user = User::new("maya", false, chrono::Utc::now());
        assert_eq!(display_name_for(user.id, Some(&user)), "maya");
    }
}
