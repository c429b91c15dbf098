//! # Thread Registry
//!
//! Owns the thread collection through a [`ThreadRepo`]. Enforces field
//! validation, expiration and ownership rules. Membership transitions are
//! layered on top by the [`MembershipEngine`](crate::engine::MembershipEngine),
//! which mutates threads only through [`ThreadRegistry::mutate_active`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::{EventBus, ThreadEvent};
use crate::membership::Access;
use crate::models::{
    normalize_tags, require_text, Thread, ThreadDraft, ThreadDuration, ThreadId, ThreadPatch,
};
use crate::session::Session;
use crate::traits::{Clock, ThreadRepo};

pub struct ThreadRegistry {
    repo: Arc<dyn ThreadRepo>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl ThreadRegistry {
    pub fn new(repo: Arc<dyn ThreadRepo>, clock: Arc<dyn Clock>) -> Self {
        Self::with_events(repo, clock, EventBus::default())
    }

    pub fn with_events(repo: Arc<dyn ThreadRepo>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            repo,
            clock,
            events,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Creates a thread owned by the session user, who becomes its first member.
    pub async fn create_thread(
        &self,
        session: &Session,
        draft: ThreadDraft,
        duration_hours: u32,
    ) -> Result<Thread> {
        let title = require_text("title", &draft.title)?;
        let description = require_text("description", &draft.description)?;
        let location = require_text("location", &draft.location)?;
        let duration = ThreadDuration::try_from(duration_hours)?;

        let now = self.clock.now();
        let thread = Thread {
            id: Uuid::now_v7(),
            title,
            description,
            location,
            tags: normalize_tags(&draft.tags),
            creator: session.username.clone(),
            creator_id: session.user_id,
            created_at: now,
            expires_at: now + duration.as_duration(),
            members: BTreeSet::from([session.user_id]),
            pending_requests: BTreeSet::new(),
            chat: Vec::new(),
        };

        self.repo.insert(thread.clone()).await?;
        info!(
            thread_id = %thread.id,
            creator_id = %session.user_id,
            hours = duration.hours(),
            "thread created"
        );
        self.events.publish(ThreadEvent::Created {
            thread_id: thread.id,
            creator_id: session.user_id,
        });
        Ok(thread)
    }

    /// Threads that have not yet expired, newest first.
    pub async fn list_active(&self) -> Result<Vec<Thread>> {
        let now = self.clock.now();
        let mut threads: Vec<Thread> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_active(now))
            .collect();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(threads)
    }

    /// Looks a thread up regardless of expiry.
    pub async fn get_by_id(&self, id: ThreadId) -> Result<Thread> {
        self.repo.get(id).await?.ok_or_else(|| AppError::thread_not_found(id))
    }

    /// Looks a thread up, treating an expired one as absent.
    pub async fn get_active(&self, id: ThreadId) -> Result<Thread> {
        let thread = self.get_by_id(id).await?;
        if !thread.is_active(self.clock.now()) {
            return Err(AppError::thread_not_found(id));
        }
        Ok(thread)
    }

    /// Applies a creator edit to title, description, location or tags.
    pub async fn update_thread(
        &self,
        id: ThreadId,
        session: &Session,
        patch: ThreadPatch,
    ) -> Result<Thread> {
        let validated = validate_patch(patch);
        let session = session.clone();
        let thread = self
            .mutate_active(id, move |thread| {
                if !Access::evaluate(thread, Some(&session)).can_edit() {
                    return Err(AppError::Unauthorized(
                        "only the creator can edit this thread".into(),
                    ));
                }
                let patch = validated?;
                if let Some(title) = patch.title {
                    thread.title = title;
                }
                if let Some(description) = patch.description {
                    thread.description = description;
                }
                if let Some(location) = patch.location {
                    thread.location = location;
                }
                if let Some(tags) = patch.tags {
                    thread.tags = tags;
                }
                Ok(())
            })
            .await?;

        debug!(thread_id = %id, "thread updated");
        self.events.publish(ThreadEvent::Updated { thread_id: id });
        Ok(thread)
    }

    /// Removes a thread with its chat log and membership sets.
    /// Only the creator or an admin may do this; expired threads included.
    pub async fn delete_thread(&self, id: ThreadId, session: &Session) -> Result<()> {
        let thread = self.get_by_id(id).await?;
        let access = Access::evaluate(&thread, Some(session));
        if !access.can_delete() {
            return Err(AppError::Unauthorized(
                "only the creator or an admin can delete this thread".into(),
            ));
        }

        self.repo.remove(id).await?.ok_or_else(|| AppError::thread_not_found(id))?;
        let by_admin = !thread.is_creator(session.user_id);
        info!(thread_id = %id, user_id = %session.user_id, by_admin, "thread deleted");
        self.events.publish(ThreadEvent::Deleted {
            thread_id: id,
            by_admin,
        });
        Ok(())
    }

    /// Runs `apply` under the thread's exclusive lock, failing with `NotFound`
    /// when the thread is missing or has expired by the time the lock is held.
    pub(crate) async fn mutate_active<F>(&self, id: ThreadId, apply: F) -> Result<Thread>
    where
        F: FnOnce(&mut Thread) -> Result<()> + Send + 'static,
    {
        let now = self.clock.now();
        self.repo
            .mutate(
                id,
                Box::new(move |thread: &mut Thread| {
                    if !thread.is_active(now) {
                        return Err(AppError::thread_not_found(thread.id));
                    }
                    apply(thread)
                }),
            )
            .await
    }
}

fn validate_patch(patch: ThreadPatch) -> Result<ThreadPatch> {
    let field = |name: &str, value: Option<String>| -> Result<Option<String>> {
        value.as_deref().map(|v| require_text(name, v)).transpose()
    };
    Ok(ThreadPatch {
        title: field("title", patch.title)?,
        description: field("description", patch.description)?,
        location: field("location", patch.location)?,
        tags: patch.tags.map(|tags| normalize_tags(&tags)),
    })
}
