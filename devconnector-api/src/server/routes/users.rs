use crate::server::{
    AuthSettings, Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Message},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use devconnector_common::{
    model::{
        IdGenerator,
        auth::{AuthToken, hash_password, verify_password},
        user::{Login, Registration, User, normalize_email},
    },
    validation::validate,
};
use devconnector_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(test)
        .typed_post(register)
        .typed_post(login)
        .typed_get(current)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/test", rejection(ServerError))]
struct TestPath();

async fn test(TestPath(): TestPath) -> Json<Message> {
    Message::json("Users Works")
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/register", rejection(ServerError))]
struct RegisterPath();

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<dyn Store>>,
    State(ids): State<Arc<IdGenerator>>,
    Json(mut registration): Json<Registration>,
) -> Result<Json<User>> {
    registration.email = normalize_email(&registration.email);
    validate(&registration).map_err(ServerError::Validation)?;

    if store.fetch_credentials(&registration.email).await?.is_some() {
        return Err(ServerError::EmailTaken);
    }

    let user = User {
        id: ids.next_id()?,
        name: registration.name.trim().to_owned(),
        email: registration.email,
        avatar: registration.avatar,
        date: OffsetDateTime::now_utc(),
    };
    let password_hash = hash_password(&registration.password)?;

    store
        .insert_user(&user, &password_hash)
        .await
        .map_err(|err| match err {
            DbError::Conflict(_) => ServerError::EmailTaken,
            err => err.into(),
        })?;

    info!(user_id = %user.id, "Registered user");
    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LoginResponse {
    success: bool,
    token: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(auth): State<AuthSettings>,
    Json(mut login): Json<Login>,
) -> Result<Json<LoginResponse>> {
    login.email = normalize_email(&login.email);
    validate(&login).map_err(ServerError::Validation)?;

    let credentials = store
        .fetch_credentials(&login.email)
        .await?
        .ok_or(ServerError::UserByEmailNotFound)?;

    if !verify_password(&login.password, &credentials.password_hash)? {
        return Err(ServerError::IncorrectPassword);
    }

    let user_id = credentials.user.id;
    let (token, authentication) =
        AuthToken::issue(user_id, OffsetDateTime::now_utc(), auth.token_lifetime)?;
    store.insert_auth(&authentication).await?;

    info!(%user_id, "Issued auth token");
    Ok(Json(LoginResponse {
        success: true,
        token: format!("Bearer {token}"),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/current", rejection(ServerError))]
struct CurrentPath();

async fn current(
    CurrentPath(): CurrentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let id = user.user_id();
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}
