// End-to-end tests: real router on an ephemeral port, driven with reqwest
use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use scene_composer::compositor::{ComposeConfig, Compositor, PlacementBox};
use scene_composer::server::{self, AppState};
use serde_json::{Value, json};
use std::io::Cursor;

fn png_bytes(image: DynamicImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

fn scene(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

fn red_square_data_url() -> String {
    let png = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]))));
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}

/// 把背景写到临时目录，返回路径。
fn write_background(name: &str, image: &RgbImage) -> PathBuf {
    let path = std::env::temp_dir().join(format!("scene-composer-{}-{}.png", std::process::id(), name));
    std::fs::write(&path, png_bytes(DynamicImage::ImageRgb8(image.clone()))).expect("write background");
    path
}

async fn spawn_server(background_path: PathBuf, placement: PlacementBox, origin: &str) -> String {
    let config = ComposeConfig {
        background_path,
        placement,
        ..ComposeConfig::default()
    };
    spawn_server_with(config, origin).await
}

async fn spawn_server_with(config: ComposeConfig, origin: &str) -> String {
    let compositor = Compositor::new(config).expect("compositor init failed");
    let app = server::router(AppState::new(compositor, origin).expect("state init failed"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn healthz_is_plain_ok_with_cors() {
    let base = spawn_server(PathBuf::from("/unused.png"), PlacementBox::DEFAULT, "*").await;

    let resp = reqwest::get(format!("{}/healthz", base)).await.expect("request failed");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(resp.headers()["access-control-allow-methods"], "GET,POST,OPTIONS");
    assert_eq!(resp.headers()["access-control-allow-headers"], "Content-Type");
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn compose_returns_png_with_red_box_and_untouched_scene() {
    let bg = scene(1920, 1280);
    let path = write_background("binary", &bg);
    let base = spawn_server(path.clone(), PlacementBox::new(600, 680, 940, 1080), "*").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "image": red_square_data_url() }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let body = resp.bytes().await.expect("body");
    let out = image::load_from_memory(&body).expect("decode response").to_rgb8();

    assert_eq!(out.dimensions(), (1920, 1280));
    for (x, y, px) in out.enumerate_pixels() {
        if (600..940).contains(&x) && (680..1080).contains(&y) {
            assert_eq!(*px, Rgb([255, 0, 0]), "({x},{y}) should be solid red");
        } else {
            assert_eq!(px, bg.get_pixel(x, y), "({x},{y}) changed outside the box");
        }
    }

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn format_json_returns_data_url_and_accepts_legacy_field() {
    let path = write_background("json", &scene(64, 48));
    let base = spawn_server(path.clone(), PlacementBox::new(4, 4, 20, 20), "https://viewer.example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose?format=json", base))
        .json(&json!({ "bag_png_data_url": red_square_data_url() }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "https://viewer.example.com");
    let body: Value = resp.json().await.expect("json body");
    let url = body["image_data_url"].as_str().expect("image_data_url");
    assert!(url.starts_with("data:image/png;base64,"));

    let png = general_purpose::STANDARD
        .decode(&url["data:image/png;base64,".len()..])
        .expect("valid base64");
    let decoded = image::load_from_memory(&png).expect("valid png");
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn missing_image_is_400() {
    let base = spawn_server(PathBuf::from("/unused.png"), PlacementBox::DEFAULT, "*").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "background": "https://example.com/bg.jpg" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["error"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn absent_background_file_is_500_not_found() {
    let base = spawn_server(PathBuf::from("/nonexistent/public/scenes/cafe.jpg"), PlacementBox::DEFAULT, "*").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "image": red_square_data_url() }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "compose failed");
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn malformed_data_url_is_500() {
    let path = write_background("malformed", &scene(16, 16));
    let base = spawn_server(path.clone(), PlacementBox::new(0, 0, 8, 8), "*").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "image": "not-a-data-url" }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "compose failed");
    assert!(body["message"].is_string());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn oversized_body_uses_compose_failed_envelope() {
    let path = write_background("oversized", &scene(16, 16));
    let config = ComposeConfig {
        background_path: path.clone(),
        placement: PlacementBox::new(0, 0, 8, 8),
        max_input_bytes: 1024,
        ..ComposeConfig::default()
    };
    let base = spawn_server_with(config, "*").await;

    let payload = general_purpose::STANDARD.encode(vec![0u8; 150 * 1024]);
    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "image": format!("data:image/png;base64,{}", payload) }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "compose failed");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn non_string_image_is_500_not_400() {
    let base = spawn_server(PathBuf::from("/unused.png"), PlacementBox::DEFAULT, "*").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/compose", base))
        .json(&json!({ "image": 42 }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "compose failed");
}

#[tokio::test]
async fn preflight_and_unknown_routes() {
    let base = spawn_server(PathBuf::from("/unused.png"), PlacementBox::DEFAULT, "*").await;
    let client = reqwest::Client::new();

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/compose", base))
        .send()
        .await
        .expect("preflight failed");
    assert_eq!(preflight.status(), 204);
    assert_eq!(preflight.headers()["access-control-allow-methods"], "GET,POST,OPTIONS");

    let missing = client.get(format!("{}/nope", base)).send().await.expect("request failed");
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.headers()["access-control-allow-origin"], "*");
    let body: Value = missing.json().await.expect("json body");
    assert_eq!(body, json!({ "error": "not found" }));
}
