//! Drives the router in-process over a fresh in-memory store.
#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use devconnector_api::server::{AuthSettings, ServerState, app};
use devconnector_common::{
    model::{
        Id, IdGenerator,
        auth::AuthToken,
        user::{User, UserMarker},
    },
    util::PositiveDuration,
};
use devconnector_db::{
    memory::MemoryStore,
    store::{AuthStore, UserStore},
};
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tower::ServiceExt;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = ServerState::new(
            store.clone(),
            Arc::new(IdGenerator::default()),
            AuthSettings::default(),
        );

        Self {
            store,
            router: app(state),
        }
    }

    /// Stores a user directly and returns a ready `Authorization` header value.
    pub async fn seed_user(&self, id: u64, name: &str) -> String {
        let user = User {
            id: Id::from(id),
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar: format!("{name}.png"),
            date: OffsetDateTime::now_utc(),
        };
        self.store.insert_user(&user, "unused").await.unwrap();

        self.issue_token(user.id, None).await
    }

    /// Tokens live for a minute from `created_at`, which defaults to now.
    pub async fn issue_token(
        &self,
        user: Id<UserMarker>,
        created_at: Option<OffsetDateTime>,
    ) -> String {
        let created_at = created_at.unwrap_or_else(OffsetDateTime::now_utc);
        let lifetime = PositiveDuration::from_seconds(60);
        let (token, authentication) = AuthToken::issue(user, created_at, lifetime).unwrap();
        self.store.insert_auth(&authentication).await.unwrap();

        format!("Bearer {token}")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, bytes.to_vec())
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, auth, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }
}
