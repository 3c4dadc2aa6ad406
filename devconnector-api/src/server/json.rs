use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

/// JSON body extractor and response whose failures surface as [`ServerError`].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => (TypedHeader(ContentType::json()), body).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// `{"success": true}`, returned by deletions that have nothing else to say.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Success {
    success: bool,
}

impl Success {
    pub const RESPONSE: Json<Self> = Json(Self { success: true });
}

/// `{"msg": ...}`, returned by the liveness routes of each resource.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Message {
    msg: &'static str,
}

impl Message {
    #[must_use]
    pub fn json(msg: &'static str) -> Json<Self> {
        Json(Self { msg })
    }
}
