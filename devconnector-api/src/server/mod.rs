use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::typed_header::TypedHeaderRejection;
use devconnector_common::{
    model::{
        Id, IdGenerator,
        auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError, TokenRejection},
        user::UserMarker,
    },
    snowflake::TimestampError,
    util::PositiveDuration,
    validation::FieldErrors,
};
use devconnector_content::{ContentError, ContentService};
use devconnector_db::store::{DbError, Store};
use json::Json;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

pub mod auth;
pub mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthSettings {
    /// `None` issues tokens that never expire.
    pub token_lifetime: Option<PositiveDuration>,
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub content: Arc<ContentService>,
    pub ids: Arc<IdGenerator>,
    pub auth: AuthSettings,
}

impl ServerState {
    pub fn new<S: Store + 'static>(store: Arc<S>, ids: Arc<IdGenerator>, auth: AuthSettings) -> Self {
        let content = Arc::new(ContentService::new(store.clone(), ids.clone()));

        Self {
            store,
            content,
            ids,
            auth,
        }
    }
}

/// The whole application: API routes under `/api`, request tracing, and the
/// JSON 404 fallback.
pub fn app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello" }))
        .nest("/api", routes::routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    RejectedToken(#[from] TokenRejection),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("No id could be generated: {0}")]
    IdGeneration(#[from] TimestampError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("Input was invalid: {0}")]
    Validation(FieldErrors),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(String),
    #[error("Post with id {0} cannot be changed, it was not found.")]
    PostToChangeNotFound(String),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(String),
    #[error("Email is already registered")]
    EmailTaken,
    #[error("No user is registered with that email")]
    UserByEmailNotFound,
    #[error("Password was incorrect")]
    IncorrectPassword,
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("User with id {0} has no profile.")]
    ProfileByUserNotFound(Id<UserMarker>),
    #[error("No profile has the handle {0}.")]
    ProfileByHandleNotFound(String),
    #[error("There are no profiles.")]
    NoProfiles,
    #[error("Handle {0} is already taken")]
    HandleTaken(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::PostToChangeNotFound(_)
            | ServerError::UserByEmailNotFound
            | ServerError::UserByIdNotFound(_)
            | ServerError::ProfileByUserNotFound(_)
            | ServerError::ProfileByHandleNotFound(_)
            | ServerError::NoProfiles
            | ServerError::Content(ContentError::PostNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::RejectedToken(_)
            | ServerError::Content(ContentError::NotAuthorized { .. }) => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::Validation(_)
            | ServerError::EmailTaken
            | ServerError::IncorrectPassword
            | ServerError::HandleTaken(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::Content(
                ContentError::Validation(_)
                | ContentError::AlreadyLiked { .. }
                | ContentError::NotLiked { .. }
                | ContentError::CommentNotFound { .. },
            ) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::IdGeneration(_)
            | ServerError::Database(_)
            | ServerError::Content(ContentError::IdGeneration(_) | ContentError::Store(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Response body: an object naming what went wrong. Server errors never
    /// expose their details.
    pub fn body(&self) -> Value {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => {
                field("notfound", "Resource not found")
            }
            ServerError::JsonRejection(rejection) => field("invalidjson", &rejection.body_text()),
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::RejectedToken(_) => field("unauthorized", "Unauthorized"),
            ServerError::Validation(errors) => to_value(errors),
            ServerError::PostByIdNotFound(_) => field("nopostfound", "No post found with that id"),
            ServerError::PostToChangeNotFound(_) => {
                field("postnotfound", "No post found with that id")
            }
            ServerError::CommentByIdNotFound(_) => {
                field("commentnotexist", "Comment does not exist")
            }
            ServerError::EmailTaken => field("email", "Email already exists"),
            ServerError::UserByEmailNotFound => field("email", "User not found"),
            ServerError::IncorrectPassword => field("password", "Password incorrect"),
            ServerError::UserByIdNotFound(_) => field("nouser", "User not found"),
            ServerError::ProfileByUserNotFound(_) | ServerError::ProfileByHandleNotFound(_) => {
                field("noprofile", "There is no profile for this user")
            }
            ServerError::NoProfiles => field("noprofile", "There are no profiles"),
            ServerError::HandleTaken(_) => field("handle", "That handle already exists"),
            ServerError::Content(ContentError::Validation(errors)) => {
                let mut body = Map::new();
                body.insert("errors".to_owned(), to_value(errors));
                Value::Object(body)
            }
            ServerError::Content(ContentError::PostNotFound(_)) => {
                field("postnotfound", "No post found with that id")
            }
            ServerError::Content(ContentError::NotAuthorized { .. }) => {
                field("notauthorized", "User not authorized")
            }
            ServerError::Content(ContentError::AlreadyLiked { .. }) => {
                field("alreadyliked", "User already liked this post")
            }
            ServerError::Content(ContentError::NotLiked { .. }) => {
                field("notliked", "You have not yet liked this post")
            }
            ServerError::Content(ContentError::CommentNotFound { .. }) => {
                field("commentnotexist", "Comment does not exist")
            }
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::IdGeneration(_)
            | ServerError::Database(_)
            | ServerError::Content(ContentError::IdGeneration(_) | ContentError::Store(_)) => {
                field("internal", "Internal server error")
            }
        }
    }
}

fn field(key: &str, message: &str) -> Value {
    let mut body = Map::new();
    body.insert(key.to_owned(), Value::from(message));
    Value::Object(body)
}

fn to_value(errors: &FieldErrors) -> Value {
    serde_json::to_value(errors).unwrap_or_default()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        (status, Json(self.body())).into_response()
    }
}
