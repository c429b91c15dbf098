//! # Membership status and access checks
//!
//! A (thread, user) pair is always in exactly one [`MembershipStatus`].
//! [`Access`] folds that status together with the caller's admin flag into
//! the capability table every thread read and write is checked against.

use serde::Serialize;

use crate::models::{Thread, UserId};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MembershipStatus {
    NonMember,
    Pending,
    Member,
}

impl MembershipStatus {
    pub fn of(thread: &Thread, user_id: UserId) -> Self {
        if thread.is_member(user_id) {
            MembershipStatus::Member
        } else if thread.is_pending(user_id) {
            MembershipStatus::Pending
        } else {
            MembershipStatus::NonMember
        }
    }
}

/// The caller's standing towards one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Anonymous,
    NonMember,
    Pending,
    Member,
    Creator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub role: Role,
    pub is_admin: bool,
}

impl Access {
    pub fn evaluate(thread: &Thread, session: Option<&Session>) -> Self {
        let Some(session) = session else {
            return Self {
                role: Role::Anonymous,
                is_admin: false,
            };
        };
        let role = if thread.is_creator(session.user_id) {
            Role::Creator
        } else {
            match MembershipStatus::of(thread, session.user_id) {
                MembershipStatus::Member => Role::Member,
                MembershipStatus::Pending => Role::Pending,
                MembershipStatus::NonMember => Role::NonMember,
            }
        };
        Self {
            role,
            is_admin: session.is_admin,
        }
    }

    fn is_member(self) -> bool {
        matches!(self.role, Role::Member | Role::Creator)
    }

    pub fn can_view_chat(self) -> bool {
        self.is_member() || self.is_admin
    }

    pub fn can_post(self) -> bool {
        self.is_member()
    }

    pub fn can_request_join(self) -> bool {
        self.role == Role::NonMember
    }

    pub fn can_resolve_requests(self) -> bool {
        self.role == Role::Creator
    }

    pub fn can_edit(self) -> bool {
        self.role == Role::Creator
    }

    pub fn can_delete(self) -> bool {
        self.role == Role::Creator || self.is_admin
    }
}
