//! Business rules for posts, likes and comments, independent of any transport.

use devconnector_common::{
    model::{
        Id, IdGenerator,
        post::{Comment, CommentMarker, Like, Post, PostContent, PostMarker},
        user::UserMarker,
    },
    snowflake::TimestampError,
    validation::{FieldErrors, validate},
};
use devconnector_db::store::{DbError, PostStore};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

pub type Result<T, E = ContentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Post input was invalid: {0}")]
    Validation(FieldErrors),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("User {user} does not own post {post}.")]
    NotAuthorized {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("User {user} already likes post {post}.")]
    AlreadyLiked {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("User {user} does not like post {post}.")]
    NotLiked {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("Comment {comment} does not exist on post {post}.")]
    CommentNotFound {
        post: Id<PostMarker>,
        comment: Id<CommentMarker>,
    },
    #[error("No id could be generated: {0}")]
    IdGeneration(#[from] TimestampError),
    #[error(transparent)]
    Store(#[from] DbError),
}

pub struct ContentService {
    store: Arc<dyn PostStore>,
    ids: Arc<IdGenerator>,
}

impl ContentService {
    #[must_use]
    pub fn new(store: Arc<dyn PostStore>, ids: Arc<IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        Ok(self.store.fetch_posts().await?)
    }

    pub async fn get_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        self.store
            .fetch_post(post_id)
            .await?
            .ok_or(ContentError::PostNotFound(post_id))
    }

    pub async fn create_post(&self, author: Id<UserMarker>, content: PostContent) -> Result<Post> {
        validate(&content).map_err(ContentError::Validation)?;

        let post = Post::new(
            self.ids.next_id()?,
            author,
            content,
            OffsetDateTime::now_utc(),
        );
        self.store.insert_post(&post).await?;

        info!(post_id = %post.id, user_id = %author, "Created post");
        Ok(post)
    }

    /// Removes the post together with its likes and comments.
    pub async fn delete_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<()> {
        let post = self.get_post(post_id).await?;
        if post.user != requester {
            return Err(ContentError::NotAuthorized {
                user: requester,
                post: post_id,
            });
        }

        if !self.store.delete_post(post_id).await? {
            return Err(ContentError::PostNotFound(post_id));
        }

        info!(%post_id, user_id = %requester, "Deleted post");
        Ok(())
    }

    pub async fn like_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Post> {
        let mut post = self.get_post(post_id).await?;
        if post.is_liked_by(requester) {
            return Err(ContentError::AlreadyLiked {
                user: requester,
                post: post_id,
            });
        }

        post.likes.insert(
            0,
            Like {
                user: requester,
                date: OffsetDateTime::now_utc(),
            },
        );
        self.save(&post).await?;

        debug!(%post_id, user_id = %requester, likes = post.likes.len(), "Liked post");
        Ok(post)
    }

    pub async fn unlike_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Post> {
        let mut post = self.get_post(post_id).await?;
        let index = post
            .likes
            .iter()
            .position(|like| like.user == requester)
            .ok_or(ContentError::NotLiked {
                user: requester,
                post: post_id,
            })?;

        post.likes.remove(index);
        self.save(&post).await?;

        debug!(%post_id, user_id = %requester, likes = post.likes.len(), "Unliked post");
        Ok(post)
    }

    /// Comments are not validated; any text is accepted.
    pub async fn add_comment(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
        content: PostContent,
    ) -> Result<Post> {
        let mut post = self.get_post(post_id).await?;

        let comment = Comment::new(
            self.ids.next_id()?,
            requester,
            content,
            OffsetDateTime::now_utc(),
        );
        let comment_id = comment.id;
        post.comments.insert(0, comment);
        self.save(&post).await?;

        info!(%post_id, %comment_id, user_id = %requester, "Added comment");
        Ok(post)
    }

    pub async fn delete_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
    ) -> Result<Post> {
        let mut post = self.get_post(post_id).await?;
        let index = post
            .comments
            .iter()
            .position(|comment| comment.id == comment_id)
            .ok_or(ContentError::CommentNotFound {
                post: post_id,
                comment: comment_id,
            })?;

        post.comments.remove(index);
        self.save(&post).await?;

        info!(%post_id, %comment_id, "Deleted comment");
        Ok(post)
    }

    /// Writes back likes and comments; the post may have been deleted since
    /// it was read.
    async fn save(&self, post: &Post) -> Result<()> {
        if self.store.update_post(post).await? {
            Ok(())
        } else {
            Err(ContentError::PostNotFound(post.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ContentError, ContentService};
    use devconnector_common::model::{
        Id, IdGenerator,
        post::{POST_TEXT_MAX_LEN, PostContent, PostMarker},
        user::UserMarker,
    };
    use devconnector_db::{memory::MemoryStore, store::PostStore};
    use std::sync::Arc;

    const U1: u64 = 1;
    const U2: u64 = 2;

    fn service() -> (ContentService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = ContentService::new(store.clone(), Arc::new(IdGenerator::default()));
        (service, store)
    }

    fn user(id: u64) -> Id<UserMarker> {
        id.into()
    }

    fn content(text: &str) -> PostContent {
        PostContent {
            text: text.to_owned(),
            name: "A".to_owned(),
            avatar: "a.png".to_owned(),
        }
    }

    #[tokio::test]
    async fn created_post_reads_back() {
        let (service, _) = service();

        let created = service.create_post(user(U1), content("hello")).await.unwrap();
        let fetched = service.get_post(created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.text, "hello");
        assert_eq!(fetched.name, "A");
        assert_eq!(fetched.avatar, "a.png");
        assert_eq!(fetched.user, user(U1));
        assert!(fetched.likes.is_empty());
        assert!(fetched.comments.is_empty());
    }

    #[tokio::test]
    async fn invalid_text_is_rejected_per_field() {
        let (service, store) = service();

        let err = service.create_post(user(U1), content("")).await.unwrap_err();

        let ContentError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        assert!(errors.get("text").is_some());
        assert!(store.fetch_posts().await.unwrap().is_empty());

        let too_long = "x".repeat(usize::try_from(POST_TEXT_MAX_LEN).unwrap() + 1);
        assert!(matches!(
            service.create_post(user(U1), content(&too_long)).await,
            Err(ContentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (service, _) = service();
        assert!(service.list_posts().await.unwrap().is_empty());

        for text in ["first", "second", "third"] {
            service.create_post(user(U1), content(text)).await.unwrap();
        }

        let posts = service.list_posts().await.unwrap();
        let texts: Vec<&str> = posts.iter().map(|post| post.text.as_str()).collect();

        assert_eq!(texts, ["third", "second", "first"]);
        assert!(posts.windows(2).all(|pair| pair[0].date >= pair[1].date));
    }

    #[tokio::test]
    async fn missing_post_is_not_found_everywhere() {
        let (service, _) = service();
        let missing = Id::<PostMarker>::from(404_u64);

        assert!(matches!(
            service.get_post(missing).await,
            Err(ContentError::PostNotFound(id)) if id == missing
        ));
        assert!(matches!(
            service.delete_post(user(U1), missing).await,
            Err(ContentError::PostNotFound(_))
        ));
        assert!(matches!(
            service.like_post(user(U1), missing).await,
            Err(ContentError::PostNotFound(_))
        ));
        assert!(matches!(
            service.unlike_post(user(U1), missing).await,
            Err(ContentError::PostNotFound(_))
        ));
        assert!(matches!(
            service.add_comment(user(U1), missing, content("hi")).await,
            Err(ContentError::PostNotFound(_))
        ));
        assert!(matches!(
            service.delete_comment(missing, 1_u64.into()).await,
            Err(ContentError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn second_like_is_rejected() {
        let (service, _) = service();
        let post = service.create_post(user(U1), content("hello")).await.unwrap();

        let liked = service.like_post(user(U1), post.id).await.unwrap();
        assert_eq!(liked.likes.len(), 1);

        assert!(matches!(
            service.like_post(user(U1), post.id).await,
            Err(ContentError::AlreadyLiked { .. })
        ));
        assert_eq!(service.get_post(post.id).await.unwrap().likes.len(), 1);
    }

    #[tokio::test]
    async fn likes_are_inserted_at_the_front() {
        let (service, _) = service();
        let post = service.create_post(user(U1), content("hello")).await.unwrap();

        service.like_post(user(U1), post.id).await.unwrap();
        let liked = service.like_post(user(U2), post.id).await.unwrap();

        let likers: Vec<_> = liked.likes.iter().map(|like| like.user).collect();
        assert_eq!(likers, [user(U2), user(U1)]);
    }

    #[tokio::test]
    async fn unlike_requires_a_like() {
        let (service, _) = service();
        let post = service.create_post(user(U1), content("hello")).await.unwrap();

        assert!(matches!(
            service.unlike_post(user(U1), post.id).await,
            Err(ContentError::NotLiked { .. })
        ));

        service.like_post(user(U1), post.id).await.unwrap();
        service.like_post(user(U2), post.id).await.unwrap();
        let unliked = service.unlike_post(user(U1), post.id).await.unwrap();

        assert_eq!(unliked.likes.len(), 1);
        assert_eq!(unliked.likes[0].user, user(U2));
    }

    #[tokio::test]
    async fn only_the_owner_deletes() {
        let (service, store) = service();
        let post = service.create_post(user(U1), content("hello")).await.unwrap();
        service.like_post(user(U2), post.id).await.unwrap();
        let before = store.fetch_post(post.id).await.unwrap();

        assert!(matches!(
            service.delete_post(user(U2), post.id).await,
            Err(ContentError::NotAuthorized { .. })
        ));
        assert_eq!(store.fetch_post(post.id).await.unwrap(), before);

        service.delete_post(user(U1), post.id).await.unwrap();
        assert!(matches!(
            service.get_post(post.id).await,
            Err(ContentError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn comments_are_added_and_removed_by_id() {
        let (service, _) = service();
        let post = service.create_post(user(U1), content("hello")).await.unwrap();

        service
            .add_comment(user(U2), post.id, content("first"))
            .await
            .unwrap();
        let commented = service
            .add_comment(user(U1), post.id, content("second"))
            .await
            .unwrap();

        assert_eq!(commented.comments.len(), 2);
        assert_eq!(commented.comments[0].text, "second");
        assert_eq!(commented.comments[0].user, user(U1));
        assert_ne!(commented.comments[0].id, commented.comments[1].id);

        let first_id = commented.comments[1].id;
        let remaining = service.delete_comment(post.id, first_id).await.unwrap();
        assert_eq!(remaining.comments.len(), 1);
        assert_eq!(remaining.comments[0].text, "second");

        assert!(matches!(
            service.delete_comment(post.id, first_id).await,
            Err(ContentError::CommentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn owner_scenario() {
        let (service, _) = service();

        let post = service.create_post(user(U1), content("hello")).await.unwrap();
        assert!(post.likes.is_empty() && post.comments.is_empty());

        let liked = service.like_post(user(U1), post.id).await.unwrap();
        assert_eq!(liked.likes.len(), 1);

        assert!(matches!(
            service.like_post(user(U1), post.id).await,
            Err(ContentError::AlreadyLiked { .. })
        ));
        assert!(matches!(
            service.delete_post(user(U2), post.id).await,
            Err(ContentError::NotAuthorized { .. })
        ));
        service.delete_post(user(U1), post.id).await.unwrap();
        assert!(matches!(
            service.get_post(post.id).await,
            Err(ContentError::PostNotFound(_))
        ));
    }
}
