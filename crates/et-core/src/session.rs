//! Caller context passed explicitly into every core operation.

use serde::{Deserialize, Serialize};

use crate::models::{User, UserId};

/// An authenticated caller as vouched for by an [`AuthProvider`](crate::traits::AuthProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "id")]
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}
