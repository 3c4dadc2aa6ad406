use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Message, Success},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use devconnector_common::model::{
    Id,
    post::{CommentMarker, Post, PostContent, PostMarker},
};
use devconnector_content::{ContentError, ContentService};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(test)
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_delete(delete_post)
        .typed_post(like_post)
        .typed_delete(unlike_post)
        .typed_post(add_comment)
        .typed_delete(delete_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/test", rejection(ServerError))]
struct TestPath();

async fn test(TestPath(): TestPath) -> Json<Message> {
    Message::json("Posts Works")
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(content): State<Arc<ContentService>>,
) -> Result<Json<Vec<Post>>> {
    let posts = content.list_posts().await?;

    Ok(Json(posts))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(content): State<Arc<ContentService>>,
    user: AuthenticatedUser,
    Json(post): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = content.create_post(user.user_id(), post).await?;

    Ok(Json(post))
}

/// Path segments stay strings until the handler parses them, so protected
/// routes authenticate before rejecting an id. A segment that is not an id
/// names no stored post.
fn post_to_change(segment: &str) -> Result<Id<PostMarker>> {
    segment
        .parse()
        .map_err(|_| ServerError::PostToChangeNotFound(segment.to_owned()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: String,
}

/// Reading a single post reports a missing post as `nopostfound`, unlike the
/// mutating routes.
async fn get_post(
    PostPath { id }: PostPath,
    State(content): State<Arc<ContentService>>,
) -> Result<Json<Post>> {
    let Ok(post_id) = id.parse() else {
        return Err(ServerError::PostByIdNotFound(id));
    };

    let post = content.get_post(post_id).await.map_err(|err| match err {
        ContentError::PostNotFound(_) => ServerError::PostByIdNotFound(id),
        err => err.into(),
    })?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(content): State<Arc<ContentService>>,
    user: AuthenticatedUser,
) -> Result<Json<Success>> {
    content.delete_post(user.user_id(), post_to_change(&id)?).await?;

    Ok(Success::RESPONSE)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/like/{id}", rejection(ServerError))]
struct LikePath {
    id: String,
}

async fn like_post(
    LikePath { id }: LikePath,
    State(content): State<Arc<ContentService>>,
    user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let post = content.like_post(user.user_id(), post_to_change(&id)?).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/unlike/{id}", rejection(ServerError))]
struct UnlikePath {
    id: String,
}

async fn unlike_post(
    UnlikePath { id }: UnlikePath,
    State(content): State<Arc<ContentService>>,
    user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let post = content
        .unlike_post(user.user_id(), post_to_change(&id)?)
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comment/{id}", rejection(ServerError))]
struct CommentPath {
    id: String,
}

async fn add_comment(
    CommentPath { id }: CommentPath,
    State(content): State<Arc<ContentService>>,
    user: AuthenticatedUser,
    Json(comment): Json<PostContent>,
) -> Result<Json<Post>> {
    let post = content
        .add_comment(user.user_id(), post_to_change(&id)?, comment)
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comment/{id}/{comment_id}", rejection(ServerError))]
struct DeleteCommentPath {
    id: String,
    comment_id: String,
}

// Only authenticated users reach this, but any of them may remove any comment.
async fn delete_comment(
    DeleteCommentPath {
        id,
        comment_id: comment_segment,
    }: DeleteCommentPath,
    State(content): State<Arc<ContentService>>,
    _user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let post_id = post_to_change(&id)?;

    let Ok(comment_id) = comment_segment.parse::<Id<CommentMarker>>() else {
        // A missing post still takes precedence over the comment.
        content.get_post(post_id).await?;
        return Err(ServerError::CommentByIdNotFound(comment_segment));
    };

    let post = content.delete_comment(post_id, comment_id).await?;

    Ok(Json(post))
}
