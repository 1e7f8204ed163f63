use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use mimi_media::{
    config::{Config, DatabaseConfig, MediaConfig, ServerConfig},
    create_router,
    db::MemoryCatalogStore,
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "mimi-test-boundary";

struct TestApp {
    _dir: TempDir,
    router: Router,
    catalog: MemoryCatalogStore,
}

async fn test_app(products: &[i64]) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 1,
            min_connections: 1,
            memory_product_ids: products.to_vec(),
        },
        media: MediaConfig {
            upload_dir: dir.path().join("uploads"),
            ..MediaConfig::default()
        },
    };

    let catalog = MemoryCatalogStore::new();
    for id in products {
        catalog.register_product(*id).await;
    }
    let state = AppState::new(config, Arc::new(catalog.clone())).unwrap();

    TestApp {
        _dir: dir,
        router: create_router(state),
        catalog,
    }
}

/// A multipart part: field name, optional filename, payload.
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart(parts: &[Part]) -> Body {
    let mut body = Vec::new();
    for (field, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            ),
            None => format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn files<'a>(field: &'a str, parts: &[(&'a str, &'a [u8])]) -> Vec<Part<'a>> {
    parts
        .iter()
        .map(|(filename, data)| (field, Some(*filename), *data))
        .collect()
}

async fn upload(router: &Router, path: &str, parts: &[Part<'_>]) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(parts))
        .unwrap();
    send(router, request).await
}

async fn upload_keys(router: &Router, parts: &[(&str, &[u8])]) -> Vec<String> {
    let (status, body) = upload(router, "/media", &files("files", parts)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn delete(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

async fn attach(router: &Router, product_id: i64, keys: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/products/{product_id}/images"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(keys.to_string()))
        .unwrap();
    send(router, request).await
}

async fn listing(router: &Router, product_id: i64) -> Value {
    let (status, body) = get(router, &format!("/products/{product_id}/images")).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn upload_then_fetch_returns_bytes_and_content_type() {
    let app = test_app(&[]).await;

    let keys = upload_keys(&app.router, &[("cat.png", b"png bytes"), ("dog.gif", b"gif bytes")]).await;
    assert_eq!(keys.len(), 2);
    assert!(keys[0].starts_with("product_") && keys[0].ends_with(".png"));

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(format!("/media/{}", keys[0])).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"png bytes");
}

#[tokio::test]
async fn upload_with_empty_part_is_bad_request() {
    let app = test_app(&[]).await;

    let (status, _) = upload(
        &app.router,
        "/media",
        &files("files", &[("a.png", b"data"), ("b.png", b"")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_ignores_fields_other_than_files() {
    let app = test_app(&[]).await;

    let (status, body) = upload(
        &app.router,
        "/media",
        &[
            ("note", None, b"just text"),
            ("files", Some("a.png"), b"image"),
            ("files", None, b"no filename"),
            ("other", Some("b.png"), b"wrong field"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(keys.len(), 1);
    let (status, body) = get(&app.router, &format!("/media/{}", keys[0])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"image");

    let (status, _) = upload(&app.router, "/media", &[("note", None, b"just text")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fetch_missing_and_invalid_keys() {
    let app = test_app(&[]).await;

    let (status, _) = get(&app.router, "/media/absent.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app.router, "/media/..%2Fsecret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn attach_list_delete_scenario() {
    let app = test_app(&[5]).await;
    let keys = upload_keys(&app.router, &[("a.png", b"a"), ("b.png", b"b")]).await;

    let (status, body) = attach(&app.router, 5, json!(keys)).await;
    assert_eq!(status, StatusCode::OK);
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created.as_array().unwrap().len(), 2);

    assert_eq!(
        listing(&app.router, 5).await,
        json!([
            {"key": keys[0], "isThumbnail": true},
            {"key": keys[1], "isThumbnail": false},
        ])
    );

    let (status, _) = delete(&app.router, &format!("/products/5/images/{}", keys[0])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listing(&app.router, 5).await,
        json!([{"key": keys[1], "isThumbnail": true}])
    );
    let (status, _) = get(&app.router, &format!("/media/{}", keys[0])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&app.router, &format!("/products/5/images/{}", keys[1])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing(&app.router, 5).await, json!([]));
}

#[tokio::test]
async fn attach_error_statuses() {
    let app = test_app(&[1]).await;
    let keys = upload_keys(&app.router, &[("a.png", b"a")]).await;

    let (status, _) = attach(&app.router, 404, json!(keys)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = attach(&app.router, 1, json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = attach(&app.router, 1, json!(["../../etc/passwd", "a/b.png"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = attach(&app.router, 1, json!(["never-uploaded.png"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(listing(&app.router, 1).await, json!([]));
}

#[tokio::test]
async fn attaching_same_key_to_two_products_conflicts() {
    let app = test_app(&[1, 2]).await;
    let keys = upload_keys(&app.router, &[("a.png", b"a")]).await;

    let (status, _) = attach(&app.router, 1, json!(keys)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = attach(&app.router, 2, json!(keys)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"], "CONSTRAINT_VIOLATION");
}

#[tokio::test]
async fn delete_error_statuses() {
    let app = test_app(&[1]).await;

    let (status, _) = delete(&app.router, "/products/1/images/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&app.router, "/products/1/images/..%2Fmissing.png").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn later_attach_does_not_steal_thumbnail() {
    let app = test_app(&[7]).await;
    let first = upload_keys(&app.router, &[("x.png", b"x")]).await;
    let second = upload_keys(&app.router, &[("y.png", b"y")]).await;

    attach(&app.router, 7, json!(first)).await;
    attach(&app.router, 7, json!(second)).await;

    assert_eq!(
        listing(&app.router, 7).await,
        json!([
            {"key": first[0], "isThumbnail": true},
            {"key": second[0], "isThumbnail": false},
        ])
    );
}

#[tokio::test]
async fn purge_removes_all_product_images() {
    let app = test_app(&[3]).await;
    let keys = upload_keys(&app.router, &[("a.png", b"a"), ("b.png", b"b")]).await;
    attach(&app.router, 3, json!(keys)).await;

    let (status, body) = delete(&app.router, "/products/3/images").await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["removed"], 2);

    assert_eq!(listing(&app.router, 3).await, json!([]));
    for key in &keys {
        let (status, _) = get(&app.router, &format!("/media/{key}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn removed_product_images_are_not_listed() {
    let app = test_app(&[4]).await;
    let keys = upload_keys(&app.router, &[("a.png", b"a")]).await;
    attach(&app.router, 4, json!(keys)).await;

    app.catalog.remove_product(4).await;

    assert_eq!(listing(&app.router, 4).await, json!([]));
    let (status, _) = attach(&app.router, 4, json!(keys)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn avatars_live_in_their_own_sub_root() {
    let app = test_app(&[]).await;

    let (status, body) = upload(&app.router, "/avatars", &files("file", &[("me", b"avatar")])).await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    let key = value[0].as_str().unwrap().to_string();
    assert!(key.starts_with("avatar_") && key.ends_with(".png"));

    let (status, body) = get(&app.router, &format!("/avatars/{key}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"avatar");

    let (status, _) = get(&app.router, &format!("/media/{key}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app.router, "/avatars/..%2F..%2Fsecret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_memory_backend() {
    let app = test_app(&[]).await;

    let (status, body) = get(&app.router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["database"], "memory connected");
}
