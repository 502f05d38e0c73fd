#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use trackshare_db::entities::user::{self, UserRole};
use trackshare_db::{MemoryTrackRepository, MemoryUserRepository, NewUser, UserRepository};
use trackshare_server::auth::jwt::generate_token_pair;
use trackshare_server::config::{JwtConfig, UploadLimits};
use trackshare_server::{build_router, AppState, RouterOptions};
use trackshare_storage::MemoryStorage;

pub const MP3_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x0f\xff\xfb\x90\x64\x00\x00\x00\x00";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x01";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub users: Arc<MemoryUserRepository>,
    pub tracks: Arc<MemoryTrackRepository>,
    pub storage: Arc<MemoryStorage>,
}

pub struct TestUser {
    pub model: user::Model,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(UploadLimits::default())
    }

    pub fn with_limits(limits: UploadLimits) -> Self {
        let users = Arc::new(MemoryUserRepository::new());
        let tracks = Arc::new(MemoryTrackRepository::new());
        let storage = Arc::new(MemoryStorage::new());

        let state = Arc::new(AppState::new(
            JwtConfig::new("integration-test-secret"),
            users.clone(),
            tracks.clone(),
            storage.clone(),
            limits,
        ));
        let options = RouterOptions {
            auth_rate_limit: false,
            ..Default::default()
        };

        Self {
            router: build_router(state.clone(), &options),
            state,
            users,
            tracks,
            storage,
        }
    }

    /// Insert a user directly and mint an access token for it.
    pub async fn user(&self, name: &str, role: UserRole) -> TestUser {
        let model = self
            .users
            .insert(NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "not-a-real-hash".to_string(),
                role,
            })
            .await
            .unwrap();
        let pair =
            generate_token_pair(model.id, &model.name, model.role.as_str(), &self.state.jwt)
                .unwrap();
        TestUser {
            model,
            token: pair.access_token,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, auth: Option<&TestUser>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, auth).body(Body::empty()).unwrap())
            .await
    }

    pub async fn put(&self, uri: &str, auth: Option<&TestUser>) -> (StatusCode, Value) {
        self.send(request(Method::PUT, uri, auth).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, auth: Option<&TestUser>) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, auth).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&TestUser>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(
            request(method, uri, auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        auth: Option<&TestUser>,
        form: MultipartForm,
    ) -> (StatusCode, Value) {
        let (content_type, body) = form.finish();
        self.send(
            request(method, uri, auth)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Upload a track with an MP3 body and the given extra text fields.
    pub async fn create_track(
        &self,
        owner: &TestUser,
        title: &str,
        fields: &[(&str, &str)],
    ) -> Value {
        let mut form = MultipartForm::new()
            .text("title", title)
            .file("audio_file", "song.mp3", "audio/mpeg", MP3_BYTES);
        for (name, value) in fields {
            form = form.text(name, value);
        }
        let (status, body) = self
            .multipart(Method::POST, "/api/v1/music", Some(owner), form)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

fn request(method: Method, uri: &str, auth: Option<&TestUser>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match auth {
        Some(user) => builder.header(header::AUTHORIZATION, user.bearer()),
        None => builder,
    }
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartForm {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "trackshare-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
