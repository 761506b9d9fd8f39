//! # HTTP 传输层（axum）
//!
//! ```text
//! GET     /healthz   → "ok"
//! POST    /compose   → image/png | {"image_data_url": ...}
//! OPTIONS /compose   → 204
//! *                  → 404 {"error": "not found"}
//! ```
//!
//! 所有响应都会经过 `cors::apply` 追加 CORS 头。

mod cors;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};

use crate::compositor::{ComposeError, Compositor};

/// 路由共享状态。
#[derive(Clone)]
pub struct AppState {
    pub compositor: Arc<Compositor>,
    pub allowed_origin: HeaderValue,
}

impl AppState {
    pub fn new(compositor: Compositor, allowed_origin: &str) -> Result<Self, ComposeError> {
        let allowed_origin = HeaderValue::from_str(allowed_origin)
            .map_err(|e| ComposeError::Config(format!("ALLOWED_ORIGIN 不是合法的响应头值：{}", e)))?;

        Ok(Self {
            compositor: Arc::new(compositor),
            allowed_origin,
        })
    }
}

/// 构建完整路由。
pub fn router(state: AppState) -> Router {
    // Data URL 经 base64 膨胀约 4/3，再留出 JSON 包装余量
    let body_limit = state
        .compositor
        .config()
        .max_input_bytes
        .saturating_mul(4)
        .div_ceil(3)
        .saturating_add(64 * 1024)
        .min(usize::MAX as u64) as usize;

    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/compose", post(routes::compose).options(routes::preflight))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::map_response_with_state(state.clone(), cors::apply))
        .with_state(state)
}
