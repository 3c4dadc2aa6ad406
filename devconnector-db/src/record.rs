use devconnector_common::{
    model::{
        Id, ModelValidationError,
        auth::Authentication,
        post::{Comment, Like, Post},
        profile::Profile,
        user::{User, UserCredentials},
    },
    util::PositiveDuration,
};
use sqlx::{FromRow, types::Json};
use time::{Duration, OffsetDateTime};

pub(crate) fn snowflake_of<Marker>(id: Id<Marker>) -> i64 {
    u64::from(id).cast_signed()
}

pub(crate) fn id_of<Marker>(snowflake: i64) -> Id<Marker> {
    snowflake.cast_unsigned().into()
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Json<Vec<Like>>,
    pub comments: Json<Vec<Comment>>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct ProfileRecord {
    pub profile_snowflake: i64,
    pub user_snowflake: i64,
    pub handle: String,
    pub status: String,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub skills: Vec<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl From<UserRecord> for UserCredentials {
    fn from(value: UserRecord) -> Self {
        Self {
            user: User {
                id: id_of(value.user_snowflake),
                name: value.name,
                email: value.email,
                avatar: value.avatar,
                date: value.created_at,
            },
            password_hash: value.password_hash,
        }
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: id_of(value.post_snowflake),
            user: id_of(value.user_snowflake),
            text: value.text,
            name: value.name,
            avatar: value.avatar,
            likes: value.likes.0,
            comments: value.comments.0,
            date: value.created_at,
        }
    }
}

impl From<ProfileRecord> for Profile {
    fn from(value: ProfileRecord) -> Self {
        Self {
            id: id_of(value.profile_snowflake),
            user: id_of(value.user_snowflake),
            handle: value.handle,
            status: value.status,
            company: value.company,
            website: value.website,
            location: value.location,
            bio: value.bio,
            github_username: value.github_username,
            skills: value.skills,
            date: value.created_at,
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: id_of(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| PositiveDuration::try_from(Duration::seconds(seconds)))
                .transpose()?,
        })
    }
}
