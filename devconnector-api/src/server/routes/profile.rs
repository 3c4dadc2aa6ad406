use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Message},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use devconnector_common::{
    model::{
        Id, IdGenerator,
        profile::{Profile, ProfileFields},
        user::UserMarker,
    },
    validation::validate,
};
use devconnector_db::store::{DbError, Store};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(test)
        .typed_get(own_profile)
        .typed_post(upsert_profile)
        .typed_get(all_profiles)
        .typed_get(profile_by_handle)
        .typed_get(profile_by_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/test", rejection(ServerError))]
struct TestPath();

async fn test(TestPath(): TestPath) -> Json<Message> {
    Message::json("Profile Works")
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile", rejection(ServerError))]
struct ProfilePath();

async fn own_profile(
    ProfilePath(): ProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Profile>> {
    let id = user.user_id();
    let profile = store
        .fetch_profile_by_user(id)
        .await?
        .ok_or(ServerError::ProfileByUserNotFound(id))?;

    Ok(Json(profile))
}

/// Creates the caller's profile, or overwrites the fields of the existing one.
async fn upsert_profile(
    ProfilePath(): ProfilePath,
    State(store): State<Arc<dyn Store>>,
    State(ids): State<Arc<IdGenerator>>,
    user: AuthenticatedUser,
    Json(fields): Json<ProfileFields>,
) -> Result<Json<Profile>> {
    let fields = fields.normalized();
    validate(&fields).map_err(ServerError::Validation)?;

    let user_id = user.user_id();
    if let Some(owner) = store.fetch_profile_by_handle(&fields.handle).await?
        && owner.user != user_id
    {
        return Err(ServerError::HandleTaken(fields.handle));
    }

    let handle = fields.handle.clone();
    let profile = Profile::from_fields(ids.next_id()?, user_id, fields, OffsetDateTime::now_utc());
    let profile = store
        .upsert_profile(&profile)
        .await
        .map_err(|err| match err {
            DbError::Conflict(_) => ServerError::HandleTaken(handle),
            err => err.into(),
        })?;

    info!(profile_id = %profile.id, %user_id, "Saved profile");
    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/all", rejection(ServerError))]
struct AllProfilesPath();

async fn all_profiles(
    AllProfilesPath(): AllProfilesPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Profile>>> {
    let profiles = store.fetch_profiles().await?;
    if profiles.is_empty() {
        return Err(ServerError::NoProfiles);
    }

    Ok(Json(profiles))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/handle/{handle}", rejection(ServerError))]
struct HandlePath {
    handle: String,
}

async fn profile_by_handle(
    HandlePath { handle }: HandlePath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Profile>> {
    let profile = store
        .fetch_profile_by_handle(&handle)
        .await?
        .ok_or(ServerError::ProfileByHandleNotFound(handle))?;

    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/user/{user_id}", rejection(ServerError))]
struct UserProfilePath {
    user_id: Id<UserMarker>,
}

async fn profile_by_user(
    UserProfilePath { user_id }: UserProfilePath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Profile>> {
    let profile = store
        .fetch_profile_by_user(user_id)
        .await?
        .ok_or(ServerError::ProfileByUserNotFound(user_id))?;

    Ok(Json(profile))
}
