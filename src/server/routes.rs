//! # 路由处理层
//!
//! 仅做 HTTP 参数接收与结果返回，不承载业务逻辑；实际处理全部交给 `Compositor`。

use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::compositor::{ComposeError, ComposeOutput, ComposeRequest, OutputFormat};
use crate::error::AppError;

const MISSING_IMAGE: &str = "image (data URL) or bag_png_data_url is required";

#[derive(Debug, Default, Deserialize)]
pub struct ComposeParams {
    format: Option<String>,
}

impl ComposeParams {
    fn output_format(&self) -> OutputFormat {
        match self.format.as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => OutputFormat::DataUrl,
            _ => OutputFormat::Png,
        }
    }
}

/// JSON 真值判定：`null`、`false`、`0`、空串、空数组、空对象视为“未提供”。
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// 取“有值”的字段；值存在但不是字符串时属于输入错误（走 500 合成失败）。
fn string_field<'a>(body: &'a Value, key: &str) -> Result<Option<&'a str>, AppError> {
    match body.get(key).filter(|v| is_truthy(v)) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ComposeError::InvalidInput(format!("{} 必须是字符串，收到：{}", key, json_kind(other))).into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 宽松解析请求体。
///
/// - 非法 JSON 或“空值”请求体视为 `{}`，缺图返回 400。
/// - 非对象的请求体（如数组）无法取字段，按合成失败处理。
/// - `image` 优先于旧字段 `bag_png_data_url`；字段存在但不是字符串同样按合成失败处理。
pub(crate) fn parse_compose_body(raw: &[u8], format: OutputFormat) -> Result<ComposeRequest, AppError> {
    let body = serde_json::from_slice::<Value>(raw)
        .ok()
        .filter(is_truthy)
        .unwrap_or_else(|| Value::Object(Default::default()));

    if !body.is_object() {
        return Err(ComposeError::InvalidInput(format!("请求体必须是 JSON 对象，收到：{}", json_kind(&body))).into());
    }

    let image = match string_field(&body, "image")? {
        Some(image) => image,
        None => string_field(&body, "bag_png_data_url")?.ok_or_else(|| AppError::BadRequest(MISSING_IMAGE.to_string()))?,
    };

    Ok(ComposeRequest {
        image: image.to_string(),
        background: string_field(&body, "background")?.map(str::to_string),
        format,
    })
}

/// 请求体读取失败（含超过体积上限）统一映射为输入错误。
fn map_body_rejection(rejection: BytesRejection) -> AppError {
    let message = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        format!("请求体超过体积上限：{}", rejection.body_text())
    } else {
        format!("请求体读取失败：{}", rejection.body_text())
    };
    log::warn!("⚠️ {}", message);
    ComposeError::InvalidInput(message).into()
}

pub async fn compose(
    State(state): State<AppState>,
    Query(params): Query<ComposeParams>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    let body = body.map_err(map_body_rejection)?;
    let request = parse_compose_body(&body, params.output_format())?;

    let response = match state.compositor.compose(request).await? {
        ComposeOutput::Png(png) => ([(CONTENT_TYPE, "image/png")], png).into_response(),
        ComposeOutput::DataUrl(url) => Json(serde_json::json!({ "image_data_url": url })).into_response(),
    };

    Ok(response)
}

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn healthz() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], "ok")
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
