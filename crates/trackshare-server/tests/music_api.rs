mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{MultipartForm, TestApp, MP3_BYTES, PNG_BYTES};
use serde_json::Value;
use tower::ServiceExt;
use trackshare_db::entities::track::DEFAULT_BACKGROUND_IMAGE;
use trackshare_db::entities::user::UserRole;
use trackshare_server::config::UploadLimits;
use trackshare_storage::{AssetKind, StorageBackend};

fn id_of(track: &Value) -> String {
    track["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_publish_and_play() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let track = app.create_track(&alice, "Song A", &[]).await;
    assert_eq!(track["title"], "Song A");
    assert_eq!(track["status"], "draft");
    assert_eq!(track["is_public"], false);
    assert_eq!(track["background_image"], DEFAULT_BACKGROUND_IMAGE);
    assert!(track["published_at"].is_null());
    assert!(track["audio_file"].as_str().unwrap().starts_with("music-"));
    assert!(track["audio_file"].as_str().unwrap().ends_with(".mp3"));

    let id = id_of(&track);
    let (status, published) = app
        .put(&format!("/api/v1/music/{id}/publish"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    assert_eq!(published["is_public"], true);
    assert!(!published["published_at"].is_null());
    assert_eq!(published["play_count"], 0);

    let (status, fetched) = app.get(&format!("/api/v1/music/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["play_count"], 1);
}

#[tokio::test]
async fn test_publish_twice_rejected() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);

    let (_, first) = app
        .put(&format!("/api/v1/music/{id}/publish"), Some(&alice))
        .await;
    let (status, body) = app
        .put(&format!("/api/v1/music/{id}/publish"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ALREADY_PUBLISHED");
    assert_eq!(body["error"], "Music is already published");

    let (_, fetched) = app.get(&format!("/api/v1/music/{id}"), None).await;
    assert_eq!(fetched["published_at"], first["published_at"]);
}

#[tokio::test]
async fn test_draft_hidden_from_everyone_but_owner() {
    let app = TestApp::new();
    let admin = app.user("Root", UserRole::Admin).await;
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Secret", &[]).await);
    let uri = format!("/api/v1/music/{id}");

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to access this draft");
    assert!(body.get("title").is_none());

    assert_eq!(app.get(&uri, Some(&bob)).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get(&uri, Some(&admin)).await.0, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Secret");
}

#[tokio::test]
async fn test_update_ownership() {
    let app = TestApp::new();
    let admin = app.user("Root", UserRole::Admin).await;
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);
    let uri = format!("/api/v1/music/{id}");

    let form = MultipartForm::new().text("title", "Hijacked");
    let (status, body) = app.multipart(Method::PUT, &uri, Some(&bob), form).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let form = MultipartForm::new()
        .text("title", "Remastered")
        .text("genre", "ambient");
    let (status, body) = app.multipart(Method::PUT, &uri, Some(&admin), form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Remastered");
    assert_eq!(body["genre"], "ambient");
}

#[tokio::test]
async fn test_update_replaces_cover_and_is_public_alias() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);

    let form = MultipartForm::new()
        .text("is_public", "true")
        .file("cover_image", "cover.png", "image/png", PNG_BYTES);
    let (status, body) = app
        .multipart(Method::PUT, &format!("/api/v1/music/{id}"), Some(&alice), form)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "published");
    assert!(!body["published_at"].is_null());

    let image = body["background_image"].as_str().unwrap();
    assert!(image.starts_with("image-") && image.ends_with(".png"));
    assert!(app.storage.exists(AssetKind::Image, image).await);
}

#[tokio::test]
async fn test_search_lists_matching_published_newest_first() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let first = app
        .create_track(&alice, "Song One", &[("status", "published")])
        .await;
    app.create_track(&alice, "Song Draft", &[]).await;
    app.create_track(&alice, "Interlude", &[("is_public", "true")])
        .await;
    let second = app
        .create_track(&alice, "Another Song", &[("status", "published")])
        .await;

    let (status, body) = app.get("/api/v1/music?search=Song", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["total_pages"], 1);

    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second["id"].as_str().unwrap(), first["id"].as_str().unwrap()]);
}

#[tokio::test]
async fn test_list_paging_falls_back_to_defaults() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    for n in 0..3 {
        app.create_track(&alice, &format!("Track {n}"), &[("status", "published")])
            .await;
    }

    let (_, body) = app.get("/api/v1/music?page=abc&limit=-1", None).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = app.get("/api/v1/music?page=2&limit=2", None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_without_audio_leaves_nothing_behind() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let form = MultipartForm::new()
        .text("title", "No audio")
        .file("cover_image", "cover.png", "image/png", PNG_BYTES);
    let (status, body) = app
        .multipart(Method::POST, "/api/v1/music", Some(&alice), form)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Title and audio file are required");
    assert!(app.storage.is_empty().await);
    assert!(app.tracks.is_empty().await);
}

#[tokio::test]
async fn test_create_requires_authentication() {
    let app = TestApp::new();
    let form = MultipartForm::new()
        .text("title", "Anonymous")
        .file("audio_file", "song.mp3", "audio/mpeg", MP3_BYTES);
    let (status, body) = app
        .multipart(Method::POST, "/api/v1/music", None, form)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authorized, no token");
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = TestApp::with_limits(UploadLimits {
        max_audio_bytes: 64,
        max_image_bytes: 64,
    });
    let alice = app.user("Alice", UserRole::User).await;

    let cases = [
        // MIME type outside the allow-list
        MultipartForm::new()
            .text("title", "Text")
            .file("audio_file", "notes.txt", "text/plain", MP3_BYTES),
        // declared audio, actually an image
        MultipartForm::new()
            .text("title", "Spoofed")
            .file("audio_file", "song.mp3", "audio/mpeg", PNG_BYTES),
        // over the size ceiling
        MultipartForm::new()
            .text("title", "Huge")
            .file("audio_file", "big.mp3", "audio/mpeg", &[MP3_BYTES, &[0u8; 128][..]].concat()),
        // two audio parts
        MultipartForm::new()
            .text("title", "Twice")
            .file("audio_file", "a.mp3", "audio/mpeg", MP3_BYTES)
            .file("audioFile", "b.mp3", "audio/mpeg", MP3_BYTES),
    ];

    for form in cases {
        let (status, body) = app
            .multipart(Method::POST, "/api/v1/music", Some(&alice), form)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["code"], "UPLOAD_REJECTED", "{body}");
    }

    assert!(app.storage.is_empty().await);
    assert!(app.tracks.is_empty().await);
}

#[tokio::test]
async fn test_non_multipart_body_is_upload_error() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/music",
            Some(&alice),
            serde_json::json!({ "title": "Song A" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UPLOAD_REJECTED", "{body}");
    assert!(body["error"].as_str().unwrap().contains("multipart/form-data"));

    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);
    let (status, body) = app
        .put(&format!("/api/v1/music/{id}"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UPLOAD_REJECTED", "{body}");
    assert_eq!(app.tracks.len().await, 1);
}

#[tokio::test]
async fn test_overlong_title_is_validation_error() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let form = MultipartForm::new()
        .text("title", &"t".repeat(256))
        .file("audio_file", "song.mp3", "audio/mpeg", MP3_BYTES);
    let (status, body) = app
        .multipart(Method::POST, "/api/v1/music", Some(&alice), form)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Title must be at most 255 characters");
    assert!(app.storage.is_empty().await);
    assert!(app.tracks.is_empty().await);
}

#[tokio::test]
async fn test_owner_summary_in_listing_and_detail() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let track = app
        .create_track(&alice, "Song A", &[("status", "published")])
        .await;
    let id = id_of(&track);

    let (_, list) = app.get("/api/v1/music", None).await;
    let owner = &list["data"][0]["owner"];
    assert_eq!(owner["id"], alice.model.id.to_string());
    assert_eq!(owner["name"], "Alice");
    assert!(owner.get("email").is_none());

    let (_, detail) = app.get(&format!("/api/v1/music/{id}"), None).await;
    assert_eq!(detail["owner"]["name"], "Alice");
    assert_eq!(detail["owner"]["email"], "alice@example.com");
    assert_eq!(detail["owner_id"], alice.model.id.to_string());
}

#[tokio::test]
async fn test_invalid_and_unknown_ids() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;

    let (status, body) = app.get("/api/v1/music/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_IDENTIFIER");
    assert_eq!(body["error"], "Invalid music ID");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .put(&format!("/api/v1/music/{missing}/like"), Some(&alice))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Music not found");
}

#[tokio::test]
async fn test_like_toggle() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);
    let like_uri = format!("/api/v1/music/{id}/like");

    let (status, body) = app.put(&like_uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot like unpublished music");

    app.put(&format!("/api/v1/music/{id}/publish"), Some(&alice))
        .await;

    let (status, body) = app.put(&like_uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "liked");
    assert_eq!(body["message"], "Music liked");
    assert_eq!(body["like_count"], 1);

    let (_, body) = app.put(&like_uri, Some(&alice)).await;
    assert_eq!(body["like_count"], 2);

    let (_, body) = app.put(&like_uri, Some(&bob)).await;
    assert_eq!(body["action"], "unliked");
    assert_eq!(body["like_count"], 1);

    let (_, track) = app.get(&format!("/api/v1/music/{id}"), None).await;
    assert_eq!(track["like_count"], 1);
    assert_eq!(track["likes"][0], alice.model.id.to_string());

    assert_eq!(app.put(&like_uri, None).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_removes_track_and_assets() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    let id = id_of(&app.create_track(&alice, "Song A", &[]).await);
    let uri = format!("/api/v1/music/{id}");

    let (status, _) = app.delete(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.storage.len(AssetKind::Audio).await, 1);

    let (status, body) = app.delete(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Music deleted successfully");
    assert!(app.storage.is_empty().await);

    let (status, _) = app.get(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_music_and_alias() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    app.create_track(&alice, "Draft", &[]).await;
    app.create_track(&alice, "Live", &[("status", "published")])
        .await;
    app.create_track(&bob, "Bob's", &[]).await;

    let (status, body) = app.get("/api/v1/music/user/mymusic", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Live", "Draft"]);

    let (_, body) = app
        .get("/api/v1/music/mymusic?status=draft", Some(&alice))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Draft");

    let (_, body) = app
        .get("/api/v1/music/mymusic?status=bogus", Some(&alice))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    assert_eq!(
        app.get("/api/v1/music/mymusic", None).await.0,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_admin_list() {
    let app = TestApp::new();
    let admin = app.user("Root", UserRole::Admin).await;
    let alice = app.user("Alice", UserRole::User).await;
    let bob = app.user("Bob", UserRole::User).await;
    app.create_track(&alice, "A1", &[]).await;
    app.create_track(&alice, "A2", &[("status", "published")])
        .await;
    app.create_track(&bob, "B1", &[]).await;

    let (status, body) = app.get("/api/v1/music/admin/all", Some(&alice)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized as admin");

    let (status, body) = app.get("/api/v1/music/admin/all", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"][0]["title"], "B1");

    let uri = format!("/api/v1/music/admin?userId={}&status=draft", alice.model.id);
    let (_, body) = app.get(&uri, Some(&admin)).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["title"], "A1");

    let (status, body) = app.get("/api/v1/music/admin?owner=xyz", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid user ID");
}

#[tokio::test]
async fn test_uploaded_assets_are_served() {
    let app = TestApp::new();
    let alice = app.user("Alice", UserRole::User).await;
    let track = app.create_track(&alice, "Song A", &[]).await;
    let name = track["audio_file"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/audio/{name}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert!(response.headers()[header::CACHE_CONTROL]
        .to_str()
        .unwrap()
        .contains("immutable"));
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], MP3_BYTES);

    assert_eq!(
        app.get("/uploads/audio/music-missing.mp3", None).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/uploads/videos/whatever.mp4", None).await.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/uploads/audio/..secret", None).await.0,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_healthz() {
    let app = TestApp::new();
    let (status, body) = app.get("/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
