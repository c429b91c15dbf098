//! # Domain Models
//!
//! These structs represent the core entities of EventThreads.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

pub type UserId = Uuid;
pub type ThreadId = Uuid;

/// Author name reserved for engine-generated chat notices.
pub const SYSTEM_AUTHOR: &str = "System";

/// A registered participant. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Display name, unique per store
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, is_admin: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            is_admin,
            created_at: now,
        }
    }
}

/// A time-bounded event gathering with its membership sets and chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub tags: Vec<String>,
    /// Display name of the creator, captured at creation
    pub creator: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub members: BTreeSet<UserId>,
    /// Always disjoint from `members`
    pub pending_requests: BTreeSet<UserId>,
    pub chat: Vec<ChatMessage>,
}

impl Thread {
    /// Active threads are listed and accept membership transitions.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    pub fn is_pending(&self, user_id: UserId) -> bool {
        self.pending_requests.contains(&user_id)
    }
}

/// A single chat entry. Owned by its thread and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    /// Author display name, or [`SYSTEM_AUTHOR`] for notices
    pub user: String,
    /// `None` for system notices
    pub user_id: Option<UserId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn from_user(
        user_id: UserId,
        user: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user: user.into(),
            user_id: Some(user_id),
            message: text.into(),
            timestamp: now,
        }
    }

    pub fn system(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user: SYSTEM_AUTHOR.to_string(),
            user_id: None,
            message: text.into(),
            timestamp: now,
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id.is_none() && self.user == SYSTEM_AUTHOR
    }
}

/// The lifetimes a thread may be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadDuration {
    OneHour,
    #[default]
    TwoHours,
    FourHours,
    EightHours,
}

impl ThreadDuration {
    pub const ALLOWED_HOURS: [u32; 4] = [1, 2, 4, 8];

    pub fn hours(self) -> u32 {
        match self {
            ThreadDuration::OneHour => 1,
            ThreadDuration::TwoHours => 2,
            ThreadDuration::FourHours => 4,
            ThreadDuration::EightHours => 8,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::hours(i64::from(self.hours()))
    }

    /// Picks the duration whose deadline lies nearest to a client-computed
    /// `expires_at`, rounded to the whole hour.
    pub fn until(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<Self> {
        let minutes = (expires_at - now).num_minutes();
        let hours = u32::try_from((minutes + 30).div_euclid(60)).map_err(|_| {
            AppError::ValidationError("expiresAt must lie in the future".into())
        })?;
        Self::try_from(hours)
    }
}

impl TryFrom<u32> for ThreadDuration {
    type Error = AppError;

    fn try_from(hours: u32) -> Result<Self> {
        match hours {
            1 => Ok(ThreadDuration::OneHour),
            2 => Ok(ThreadDuration::TwoHours),
            4 => Ok(ThreadDuration::FourHours),
            8 => Ok(ThreadDuration::EightHours),
            other => Err(AppError::ValidationError(format!(
                "duration must be one of {:?} hours, got {}",
                Self::ALLOWED_HOURS,
                other
            ))),
        }
    }
}

/// Creator-supplied fields for a new thread.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of creator-editable fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ThreadPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.tags.is_none()
    }
}

/// Trims `value`, rejecting it when nothing is left.
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims tags, drops blanks and repeats while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
