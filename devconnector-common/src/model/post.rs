use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

/// Upper bound on post text, in characters.
pub const POST_TEXT_MAX_LEN: u64 = 300;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// A post with its likes and comments embedded, most recent first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub user: Id<UserMarker>,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Like {
    pub user: Id<UserMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub user: Id<UserMarker>,
    pub text: String,
    pub name: String,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// User-supplied part of a post or comment.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize, Validate)]
pub struct PostContent {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = "POST_TEXT_MAX_LEN",
        message = "Post must be between 1 and 300 characters"
    ))]
    pub text: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

impl Post {
    #[must_use]
    pub fn new(
        id: Id<PostMarker>,
        user: Id<UserMarker>,
        content: PostContent,
        date: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            user,
            text: content.text,
            name: content.name,
            avatar: content.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            date,
        }
    }

    #[must_use]
    pub fn is_liked_by(&self, user: Id<UserMarker>) -> bool {
        self.likes.iter().any(|like| like.user == user)
    }
}

impl Comment {
    #[must_use]
    pub fn new(
        id: Id<CommentMarker>,
        user: Id<UserMarker>,
        content: PostContent,
        date: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            user,
            text: content.text,
            name: content.name,
            avatar: content.avatar,
            date,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{POST_TEXT_MAX_LEN, PostContent};
    use crate::validation::validate;

    fn max_len() -> usize {
        usize::try_from(POST_TEXT_MAX_LEN).unwrap()
    }

    fn content(text: &str) -> PostContent {
        PostContent {
            text: text.to_owned(),
            ..PostContent::default()
        }
    }

    #[test]
    fn text_length_bounds() {
        assert!(validate(&content("hello")).is_ok());
        assert!(validate(&content(&"x".repeat(max_len()))).is_ok());

        let errors = validate(&content("")).unwrap_err();
        assert_eq!(
            errors.get("text"),
            Some("Post must be between 1 and 300 characters")
        );
        assert!(validate(&content(&"x".repeat(max_len() + 1))).is_err());
    }

    #[test]
    fn text_length_counts_characters() {
        assert!(validate(&content(&"ü".repeat(max_len()))).is_ok());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let content: PostContent = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();

        assert_eq!(content.name, "");
        assert_eq!(content.avatar, "");
    }
}
