//! Storage interface shared by the PostgreSQL and in-memory backends.
//!
//! Posts are stored as whole documents: likes and comments live inside the
//! post and are written back together with it. Writes are last-write-wins.

use async_trait::async_trait;
use devconnector_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    post::{Post, PostMarker},
    profile::Profile,
    user::{User, UserCredentials, UserMarker},
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The value for {0} is already taken")]
    Conflict(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: &Post) -> Result<()>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// All posts, newest first. Posts created in the same instant are
    /// ordered by descending id.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    /// Replaces the likes and comments of a stored post.
    ///
    /// Returns `false` if the post no longer exists.
    async fn update_post(&self, post: &Post) -> Result<bool>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`DbError::Conflict`] if the email is already registered.
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_credentials(&self, email: &str) -> Result<Option<UserCredentials>>;
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn insert_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Creates the profile of `profile.user` or overwrites its fields.
    ///
    /// An existing profile keeps its id and creation date; the stored
    /// profile is returned. Fails with [`DbError::Conflict`] if another user
    /// already owns the handle.
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile>;

    async fn fetch_profile_by_user(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>>;

    async fn fetch_profile_by_handle(&self, handle: &str) -> Result<Option<Profile>>;

    /// All profiles, ordered by handle.
    async fn fetch_profiles(&self) -> Result<Vec<Profile>>;
}

pub trait Store: PostStore + UserStore + AuthStore + ProfileStore {}

impl<T> Store for T where T: PostStore + UserStore + AuthStore + ProfileStore {}
