use crate::model::Id;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: String,
    pub email: String,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// A user together with the PHC string of their password. Never serialized.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
pub struct Registration {
    #[serde(default)]
    #[validate(length(min = 2, max = 30, message = "Name must be between 2 and 30 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, max = 30, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub password2: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
pub struct Login {
    #[serde(default)]
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password field is required"))]
    pub password: String,
}

/// Emails are compared case-insensitively.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
