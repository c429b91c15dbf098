//! # et-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Regular users sign in by username alone and are registered on first use.
//! The single configured admin account must present a password that matches
//! its stored Argon2 hash.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use et_core::error::{AppError, Result};
use et_core::models::{require_text, User, UserId};
use et_core::session::Session;
use et_core::traits::{AuthProvider, Credentials, UserRepo};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

/// The configured administrator.
pub struct AdminAccount {
    pub username: String,
    /// PHC-formatted Argon2 hash
    pub password_hash: SecretString,
}

pub struct SimpleAuthProvider {
    users: Arc<dyn UserRepo>,
    admin: Option<AdminAccount>,
}

impl SimpleAuthProvider {
    pub fn new(users: Arc<dyn UserRepo>, admin: Option<AdminAccount>) -> Self {
        Self { users, admin }
    }

    /// Registers the admin account up front so its username cannot be
    /// claimed by a regular login first.
    pub async fn ensure_admin(&self) -> Result<Option<User>> {
        let Some(admin) = &self.admin else {
            return Ok(None);
        };
        let user = self.users.get_or_create(&admin.username, true).await?;
        if !user.is_admin {
            return Err(AppError::Conflict(format!(
                "username {} is already taken by a regular user",
                admin.username
            )));
        }
        Ok(Some(user))
    }

    fn is_admin_name(&self, username: &str) -> bool {
        self.admin.as_ref().is_some_and(|a| a.username == username)
    }

    /// Verifies if a provided password matches the admin's stored Argon2 hash.
    fn verify_admin_password(&self, password: &str) -> bool {
        let Some(admin) = &self.admin else {
            return false;
        };
        let parsed_hash = match PasswordHash::new(admin.password_hash.expose_secret()) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "configured admin password hash is malformed");
                return false;
            }
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
    }

    async fn admin_login(&self, username: &str, password: Option<&str>) -> Result<User> {
        let password = password.map(str::trim).unwrap_or_default();
        if password.is_empty() {
            return Err(AppError::ValidationError("admin login requires a password".into()));
        }
        if !self.is_admin_name(username) || !self.verify_admin_password(password) {
            warn!(username, "rejected admin login");
            return Err(AppError::Unauthorized("invalid admin credentials".into()));
        }
        let user = self.users.get_or_create(username, true).await?;
        if !user.is_admin {
            return Err(AppError::Unauthorized("invalid admin credentials".into()));
        }
        Ok(user)
    }

    async fn member_login(&self, username: &str) -> Result<User> {
        if self.is_admin_name(username) {
            return Err(AppError::Unauthorized("this account must use admin login".into()));
        }
        let user = self.users.get_or_create(username, false).await?;
        if user.is_admin {
            return Err(AppError::Unauthorized("this account must use admin login".into()));
        }
        Ok(user)
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn login(&self, credentials: Credentials) -> Result<Session> {
        let username = require_text("username", &credentials.username)?;
        let user = if credentials.is_admin {
            self.admin_login(&username, credentials.password.as_deref()).await?
        } else {
            self.member_login(&username).await?
        };
        info!(user_id = %user.id, is_admin = user.is_admin, "login");
        Ok(Session::from(&user))
    }

    async fn session_for(&self, user_id: UserId) -> Result<Session> {
        let user = self.users.get(user_id).await?.ok_or_else(|| AppError::user_not_found(user_id))?;
        Ok(Session::from(&user))
    }
}

/// Produces a PHC string suitable for the admin `password_hash` setting.
/// `salt_b64` is an unpadded base64 salt of 4 to 64 characters.
pub fn hash_password(password: &str, salt_b64: &str) -> Result<String> {
    let salt = SaltString::from_b64(salt_b64)
        .map_err(|e| AppError::ValidationError(format!("invalid salt: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}
