use crate::store::{AuthStore, DbError, PostStore, ProfileStore, Result, UserStore};
use async_trait::async_trait;
use devconnector_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    post::{Post, PostMarker},
    profile::Profile,
    user::{User, UserCredentials, UserMarker},
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: Mutex<HashMap<Id<PostMarker>, Post>>,
    users: Mutex<HashMap<Id<UserMarker>, UserCredentials>>,
    authentications: Mutex<HashMap<AuthTokenHash, Authentication>>,
    profiles: Mutex<HashMap<Id<UserMarker>, Profile>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, post: &Post) -> Result<()> {
        lock(&self.posts).insert(post.id, post.clone());
        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(lock(&self.posts).get(&post_id).cloned())
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = lock(&self.posts).values().cloned().collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn update_post(&self, post: &Post) -> Result<bool> {
        let mut posts = lock(&self.posts);
        let Some(stored) = posts.get_mut(&post.id) else {
            return Ok(false);
        };

        stored.likes.clone_from(&post.likes);
        stored.comments.clone_from(&post.comments);
        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(lock(&self.posts).remove(&post_id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        let mut users = lock(&self.users);
        if users
            .values()
            .any(|credentials| credentials.user.email == user.email)
        {
            return Err(DbError::Conflict("email"));
        }

        users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(())
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(lock(&self.users)
            .get(&user_id)
            .map(|credentials| credentials.user.clone()))
    }

    async fn fetch_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        Ok(lock(&self.users)
            .values()
            .find(|credentials| credentials.user.email == email)
            .cloned())
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn insert_auth(&self, authentication: &Authentication) -> Result<()> {
        lock(&self.authentications).insert(
            authentication.token_hash.clone(),
            authentication.clone(),
        );
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(lock(&self.authentications).get(token_hash).cloned())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile> {
        let mut profiles = lock(&self.profiles);
        if profiles
            .values()
            .any(|other| other.handle == profile.handle && other.user != profile.user)
        {
            return Err(DbError::Conflict("handle"));
        }

        let stored = match profiles.get(&profile.user) {
            Some(existing) => Profile {
                id: existing.id,
                date: existing.date,
                ..profile.clone()
            },
            None => profile.clone(),
        };
        profiles.insert(profile.user, stored.clone());
        Ok(stored)
    }

    async fn fetch_profile_by_user(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>> {
        Ok(lock(&self.profiles).get(&user_id).cloned())
    }

    async fn fetch_profile_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        Ok(lock(&self.profiles)
            .values()
            .find(|profile| profile.handle == handle)
            .cloned())
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles: Vec<Profile> = lock(&self.profiles).values().cloned().collect();
        profiles.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::MemoryStore,
        store::{DbError, PostStore, ProfileStore, UserStore},
    };
    use devconnector_common::model::{
        Id,
        post::{Like, Post, PostContent},
        profile::Profile,
        user::User,
    };
    use time::{Duration, OffsetDateTime, macros::datetime};

    const NOON: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn post(id: u64, date: OffsetDateTime) -> Post {
        let content = PostContent {
            text: format!("post {id}"),
            ..PostContent::default()
        };
        Post::new(id.into(), 1_u64.into(), content, date)
    }

    fn user(id: u64, email: &str) -> User {
        User {
            id: id.into(),
            name: "Ada".to_owned(),
            email: email.to_owned(),
            avatar: String::new(),
            date: NOON,
        }
    }

    fn profile(id: u64, user: u64, handle: &str) -> Profile {
        Profile {
            id: id.into(),
            user: user.into(),
            handle: handle.to_owned(),
            status: "Developer".to_owned(),
            company: None,
            website: None,
            location: None,
            bio: None,
            github_username: None,
            skills: vec!["rust".to_owned()],
            date: NOON,
        }
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let store = MemoryStore::new();
        store.insert_post(&post(1, NOON)).await.unwrap();
        store
            .insert_post(&post(2, NOON + Duration::minutes(5)))
            .await
            .unwrap();
        store
            .insert_post(&post(3, NOON - Duration::minutes(5)))
            .await
            .unwrap();
        store.insert_post(&post(4, NOON)).await.unwrap();

        let ids: Vec<u64> = store
            .fetch_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id.into())
            .collect();

        assert_eq!(ids, [2, 4, 1, 3]);
    }

    #[tokio::test]
    async fn update_only_touches_likes_and_comments() {
        let store = MemoryStore::new();
        store.insert_post(&post(1, NOON)).await.unwrap();

        let mut changed = post(1, NOON);
        changed.text = "rewritten".to_owned();
        changed.likes.push(Like {
            user: 2_u64.into(),
            date: NOON,
        });
        assert!(store.update_post(&changed).await.unwrap());

        let stored = store.fetch_post(1_u64.into()).await.unwrap().unwrap();
        assert_eq!(stored.text, "post 1");
        assert_eq!(stored.likes.len(), 1);

        assert!(!store.update_post(&post(9, NOON)).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_missing_posts() {
        let store = MemoryStore::new();
        store.insert_post(&post(1, NOON)).await.unwrap();

        assert!(store.delete_post(1_u64.into()).await.unwrap());
        assert!(!store.delete_post(1_u64.into()).await.unwrap());
        assert_eq!(store.fetch_post(1_u64.into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn emails_are_unique() {
        let store = MemoryStore::new();
        store
            .insert_user(&user(1, "ada@example.com"), "hash")
            .await
            .unwrap();

        let err = store
            .insert_user(&user(2, "ada@example.com"), "hash")
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Conflict("email")));
        let credentials = store
            .fetch_credentials("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credentials.user.id, Id::from(1_u64));
        assert_eq!(credentials.password_hash, "hash");
    }

    #[tokio::test]
    async fn upsert_keeps_profile_identity() {
        let store = MemoryStore::new();
        store.upsert_profile(&profile(1, 10, "ada")).await.unwrap();

        let mut edited = profile(2, 10, "lovelace");
        edited.date = NOON + Duration::days(1);
        let stored = store.upsert_profile(&edited).await.unwrap();

        assert_eq!(stored.id, Id::from(1_u64));
        assert_eq!(stored.date, NOON);
        assert_eq!(stored.handle, "lovelace");
        assert_eq!(store.fetch_profile_by_handle("ada").await.unwrap(), None);
    }

    #[tokio::test]
    async fn handles_are_unique_across_users() {
        let store = MemoryStore::new();
        store.upsert_profile(&profile(1, 10, "ada")).await.unwrap();

        let err = store
            .upsert_profile(&profile(2, 11, "ada"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Conflict("handle")));
        assert_eq!(store.fetch_profiles().await.unwrap().len(), 1);
    }
}
