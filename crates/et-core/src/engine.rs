//! # Membership & Chat Engine
//!
//! Drives the per-(thread, user) state machine
//! `NonMember -> Pending -> Member` (and `Pending -> NonMember` on denial)
//! and gates the chat log on membership. Every transition runs inside
//! [`ThreadRegistry::mutate_active`], so its preconditions are checked under
//! the same lock that commits it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::admin::display_name_for;
use crate::error::{AppError, Result};
use crate::events::ThreadEvent;
use crate::membership::{Access, MembershipStatus, Role};
use crate::models::{require_text, ChatMessage, Thread, ThreadId, UserId};
use crate::registry::ThreadRegistry;
use crate::session::Session;
use crate::traits::UserRepo;

/// A thread as one caller is allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    #[serde(flatten)]
    pub thread: Thread,
    pub membership: MembershipStatus,
    pub role: Role,
    /// When false, `chat` has been emptied. `pendingRequests` is likewise
    /// emptied for everyone but the creator.
    pub can_view_chat: bool,
    pub can_request_join: bool,
}

impl ThreadView {
    pub fn new(mut thread: Thread, session: Option<&Session>) -> Self {
        let access = Access::evaluate(&thread, session);
        let membership = session
            .map(|s| MembershipStatus::of(&thread, s.user_id))
            .unwrap_or(MembershipStatus::NonMember);
        let can_view_chat = access.can_view_chat();
        if !can_view_chat {
            thread.chat.clear();
        }
        // Only the creator acts on join requests.
        if !access.can_resolve_requests() {
            thread.pending_requests.clear();
        }
        Self {
            thread,
            membership,
            role: access.role,
            can_view_chat,
            can_request_join: access.can_request_join(),
        }
    }
}

pub struct MembershipEngine {
    registry: Arc<ThreadRegistry>,
    users: Arc<dyn UserRepo>,
}

impl MembershipEngine {
    pub fn new(registry: Arc<ThreadRegistry>, users: Arc<dyn UserRepo>) -> Self {
        Self { registry, users }
    }

    pub fn registry(&self) -> &Arc<ThreadRegistry> {
        &self.registry
    }

    /// Asks to join `thread_id`. The caller becomes a pending requester.
    pub async fn request_join(&self, thread_id: ThreadId, session: &Session) -> Result<Thread> {
        let user_id = session.user_id;
        let thread = self
            .registry
            .mutate_active(thread_id, move |thread| {
                match MembershipStatus::of(thread, user_id) {
                    MembershipStatus::Member => {
                        Err(AppError::Conflict("already a member of this thread".into()))
                    }
                    MembershipStatus::Pending => {
                        Err(AppError::Conflict("join request already pending".into()))
                    }
                    MembershipStatus::NonMember => {
                        thread.pending_requests.insert(user_id);
                        Ok(())
                    }
                }
            })
            .await?;

        debug!(%thread_id, %user_id, "join requested");
        self.registry.events().publish(ThreadEvent::JoinRequested { thread_id, user_id });
        Ok(thread)
    }

    /// Approves or denies a pending request. Only the creator may resolve.
    /// Approval appends exactly one system notice to the chat; denial appends none.
    pub async fn resolve_request(
        &self,
        thread_id: ThreadId,
        requester_id: UserId,
        approve: bool,
        acting: &Session,
    ) -> Result<Thread> {
        let notice_name = if approve {
            Some(self.display_name(requester_id).await?)
        } else {
            None
        };
        let acting = acting.clone();
        let now = self.registry.now();

        let thread = self
            .registry
            .mutate_active(thread_id, move |thread| {
                if !Access::evaluate(thread, Some(&acting)).can_resolve_requests() {
                    return Err(AppError::Unauthorized(
                        "only the creator can resolve join requests".into(),
                    ));
                }
                if !thread.pending_requests.remove(&requester_id) {
                    return Err(AppError::Conflict("no pending join request for this user".into()));
                }
                if let Some(name) = notice_name {
                    thread.members.insert(requester_id);
                    thread.chat.push(ChatMessage::system(format!("{name} joined the thread"), now));
                }
                Ok(())
            })
            .await?;

        info!(%thread_id, %requester_id, approve, "join request resolved");
        self.registry.events().publish(ThreadEvent::RequestResolved {
            thread_id,
            user_id: requester_id,
            approved: approve,
        });
        Ok(thread)
    }

    /// Appends a message authored by the session user. Members only.
    pub async fn post_message(
        &self,
        thread_id: ThreadId,
        session: &Session,
        text: &str,
    ) -> Result<ChatMessage> {
        let validated = require_text("message", text);
        let session = session.clone();
        let user_id = session.user_id;
        let now = self.registry.now();

        let thread = self
            .registry
            .mutate_active(thread_id, move |thread| {
                if !Access::evaluate(thread, Some(&session)).can_post() {
                    return Err(AppError::Unauthorized(
                        "only members can post in this thread".into(),
                    ));
                }
                let text = validated?;
                let message = ChatMessage::from_user(session.user_id, session.username, text, now);
                thread.chat.push(message);
                Ok(())
            })
            .await?;

        let message = thread
            .chat
            .last()
            .cloned()
            .ok_or_else(|| AppError::Internal("committed chat log is empty".into()))?;
        debug!(%thread_id, %user_id, message_id = %message.id, "message posted");
        self.registry.events().publish(ThreadEvent::MessagePosted { thread_id, user_id });
        Ok(message)
    }

    pub async fn membership_status(
        &self,
        thread_id: ThreadId,
        user_id: UserId,
    ) -> Result<MembershipStatus> {
        let thread = self.registry.get_by_id(thread_id).await?;
        Ok(MembershipStatus::of(&thread, user_id))
    }

    pub async fn is_member(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool> {
        Ok(self.membership_status(thread_id, user_id).await? == MembershipStatus::Member)
    }

    /// Thread detail for `session`, with chat hidden from those not allowed to read it.
    pub async fn view(&self, thread_id: ThreadId, session: Option<&Session>) -> Result<ThreadView> {
        let thread = self.registry.get_by_id(thread_id).await?;
        Ok(ThreadView::new(thread, session))
    }

    /// Active threads as seen by `session`, newest first.
    pub async fn list_active_views(&self, session: Option<&Session>) -> Result<Vec<ThreadView>> {
        Ok(self
            .registry
            .list_active()
            .await?
            .into_iter()
            .map(|t| ThreadView::new(t, session))
            .collect())
    }

    async fn display_name(&self, user_id: UserId) -> Result<String> {
        let user = self.users.get(user_id).await?;
        Ok(display_name_for(user_id, user.as_ref()))
    }
}
