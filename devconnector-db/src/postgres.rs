use crate::{
    record::{AuthenticationRecord, PostRecord, ProfileRecord, UserRecord, snowflake_of},
    store::{AuthStore, DbError, PostStore, ProfileStore, Result, UserStore},
};
use async_trait::async_trait;
use devconnector_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    post::{Post, PostMarker},
    profile::Profile,
    user::{User, UserCredentials, UserMarker},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, types::Json};
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

/// Maps unique violations of the named constraint to [`DbError::Conflict`].
fn conflict_on(
    constraint: &'static str,
    field: &'static str,
) -> impl FnOnce(sqlx::Error) -> DbError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
            && db_err.constraint() == Some(constraint)
        {
            return DbError::Conflict(field);
        }
        err.into()
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, post: &Post) -> Result<()> {
        query(
            "
            INSERT INTO posts.posts
                (post_snowflake, user_snowflake, text, name, avatar, likes, comments, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(snowflake_of(post.id))
        .bind(snowflake_of(post.user))
        .bind(&post.text)
        .bind(&post.name)
        .bind(&post.avatar)
        .bind(Json(&post.likes))
        .bind(Json(&post.comments))
        .bind(post.date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                post_snowflake, user_snowflake, text, name, avatar, likes, comments, created_at
            FROM
                posts.posts
            WHERE
                post_snowflake = $1
            ",
        )
        .bind(snowflake_of(post_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                post_snowflake, user_snowflake, text, name, avatar, likes, comments, created_at
            FROM
                posts.posts
            ORDER BY
                created_at DESC, post_snowflake DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    async fn update_post(&self, post: &Post) -> Result<bool> {
        let result = query(
            "
            UPDATE posts.posts
            SET likes = $2, comments = $3
            WHERE post_snowflake = $1
            ",
        )
        .bind(snowflake_of(post.id))
        .bind(Json(&post.likes))
        .bind(Json(&post.comments))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(snowflake_of(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        query(
            "
            INSERT INTO users.users
                (user_snowflake, name, email, avatar, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(snowflake_of(user.id))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(password_hash)
        .bind(user.date)
        .execute(&self.pool)
        .await
        .map_err(conflict_on("users_email_key", "email"))?;

        Ok(())
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                user_snowflake, name, email, avatar, password_hash, created_at
            FROM
                users.users
            WHERE
                user_snowflake = $1
            ",
        )
        .bind(snowflake_of(user_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|record| UserCredentials::from(record).user))
    }

    async fn fetch_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                user_snowflake, name, email, avatar, password_hash, created_at
            FROM
                users.users
            WHERE
                email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(UserCredentials::from))
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn insert_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(snowflake_of(authentication.user))
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                user_snowflake, token_hash, created_at, expires_after_seconds
            FROM
                users.authentications
            WHERE
                token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }
}

const PROFILE_COLUMNS: &str = "
    profile_snowflake, user_snowflake, handle, status, company, website,
    location, bio, github_username, skills, created_at
";

#[async_trait]
impl ProfileStore for PgStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile> {
        let statement = format!(
            "
            INSERT INTO profiles.profiles ({PROFILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_snowflake) DO UPDATE SET
                handle = EXCLUDED.handle,
                status = EXCLUDED.status,
                company = EXCLUDED.company,
                website = EXCLUDED.website,
                location = EXCLUDED.location,
                bio = EXCLUDED.bio,
                github_username = EXCLUDED.github_username,
                skills = EXCLUDED.skills
            RETURNING {PROFILE_COLUMNS}
            "
        );

        let record = query_as::<_, ProfileRecord>(&statement)
            .bind(snowflake_of(profile.id))
            .bind(snowflake_of(profile.user))
            .bind(&profile.handle)
            .bind(&profile.status)
            .bind(&profile.company)
            .bind(&profile.website)
            .bind(&profile.location)
            .bind(&profile.bio)
            .bind(&profile.github_username)
            .bind(&profile.skills)
            .bind(profile.date)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_on("profiles_handle_key", "handle"))?;

        Ok(record.into())
    }

    async fn fetch_profile_by_user(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>> {
        let statement =
            format!("SELECT {PROFILE_COLUMNS} FROM profiles.profiles WHERE user_snowflake = $1");

        let record = query_as::<_, ProfileRecord>(&statement)
            .bind(snowflake_of(user_id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Profile::from))
    }

    async fn fetch_profile_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        let statement =
            format!("SELECT {PROFILE_COLUMNS} FROM profiles.profiles WHERE handle = $1");

        let record = query_as::<_, ProfileRecord>(&statement)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Profile::from))
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>> {
        let statement = format!("SELECT {PROFILE_COLUMNS} FROM profiles.profiles ORDER BY handle");

        let records = query_as::<_, ProfileRecord>(&statement)
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Profile::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{id_of, snowflake_of};
    use devconnector_common::model::{Id, post::PostMarker};

    #[test]
    fn snowflakes_survive_signed_columns() {
        let id = Id::<PostMarker>::from(u64::MAX - 5);

        assert_eq!(id_of::<PostMarker>(snowflake_of(id)), id);
    }
}
