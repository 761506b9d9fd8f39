//! 统一错误类型模块
//!
//! # 设计思路
//!
//! HTTP 层只认识 `AppError`：合成链路的所有失败都经 `From<ComposeError>` 上转，
//! 再由 `IntoResponse` 决定状态码与 JSON 信封，合成模块本身不感知 HTTP。
//!
//! # 映射规则
//!
//! | 分支 | 状态码 | 响应体 |
//! |------|--------|--------|
//! | `BadRequest` | 400 | `{"error": "..."}` |
//! | `Compose` | 500 | `{"error": "compose failed", "message": "..."}` |
//! | `NotFound` | 404 | `{"error": "not found"}` |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::compositor::ComposeError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 请求缺少必填字段（进入合成器之前即可判定）
    #[error("{0}")]
    BadRequest(String),

    /// 合成链路失败
    #[error("{0}")]
    Compose(#[from] ComposeError),

    /// 未匹配的路由
    #[error("not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Compose(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BadRequest(msg) => ErrorBody {
                error: msg,
                message: None,
            },
            Self::Compose(err) => {
                log::error!("❌ compose failed [{}@{}]: {}", err.code(), err.stage(), err);
                ErrorBody {
                    error: "compose failed",
                    message: Some(err.to_string()),
                }
            }
            Self::NotFound => ErrorBody {
                error: "not found",
                message: None,
            },
        };

        (status, Json(body)).into_response()
    }
}
