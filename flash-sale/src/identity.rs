//! Buyer identities.
//!
//! A minimal login: a username becomes the identity `user_{username}`. There
//! are no passwords or sessions; the registry only remembers who logged in so
//! the identity can be looked up again.

use crate::types::Identity;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Shortest accepted username
pub const MIN_USERNAME_LEN: usize = 3;
/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 30;

/// Rejected login or identity input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No username given
    #[error("\"username\" is required")]
    MissingUsername,
    /// Username too short or too long
    #[error("\"username\" length must be between 3 and 30 characters")]
    InvalidLength,
    /// Username contains something other than ASCII letters and digits
    #[error("\"username\" must only contain alpha-numeric characters")]
    NotAlphanumeric,
    /// No user id given
    #[error("\"userId\" is required")]
    MissingUserId,
    /// User id given as an empty string
    #[error("\"userId\" is not allowed to be empty")]
    EmptyUserId,
    /// User id given as something other than a string
    #[error("\"userId\" must be a string")]
    UserIdNotString,
}

/// A logged-in user
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    /// Identity used for purchases
    pub id: Identity,
    /// Name the user logged in with
    pub username: String,
}

/// Validate a username
///
/// # Errors
///
/// Returns the first rule the username breaks.
pub fn validate_username(username: &str) -> Result<(), IdentityError> {
    if username.is_empty() {
        return Err(IdentityError::MissingUsername);
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IdentityError::NotAlphanumeric);
    }
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len()) {
        return Err(IdentityError::InvalidLength);
    }
    Ok(())
}

/// Turn a raw user id into an [`Identity`]
///
/// The id is used verbatim; only the empty string is refused.
///
/// # Errors
///
/// Returns [`IdentityError::EmptyUserId`] for an empty id.
pub fn parse_identity(raw: &str) -> Result<Identity, IdentityError> {
    if raw.is_empty() {
        return Err(IdentityError::EmptyUserId);
    }
    Ok(Identity::new(raw))
}

/// Turn a JSON `userId` field into an [`Identity`]
///
/// # Errors
///
/// Returns [`IdentityError::MissingUserId`] when the field is absent,
/// [`IdentityError::UserIdNotString`] when it holds anything but a string
/// (`null` included), and otherwise whatever [`parse_identity`] returns.
pub fn identity_from_json(field: Option<&Value>) -> Result<Identity, IdentityError> {
    match field {
        None => Err(IdentityError::MissingUserId),
        Some(Value::String(raw)) => parse_identity(raw),
        Some(_) => Err(IdentityError::UserIdNotString),
    }
}

/// In-memory record of logged-in users
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    users: RwLock<HashMap<Identity, User>>,
}

impl IdentityRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `username` in, creating the user on first login
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the username is invalid.
    pub fn login(&self, username: &str) -> Result<User, IdentityError> {
        validate_username(username)?;

        let user = User {
            id: Identity::new(format!("user_{username}")),
            username: username.to_string(),
        };
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id.clone(), user.clone());

        tracing::debug!(identity = %user.id, "User logged in");
        Ok(user)
    }

    /// Look up a user by identity
    #[must_use]
    pub fn user(&self, id: &Identity) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Forget every user
    pub fn clear(&self) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
