//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 合成链路中的所有失败都收敛到 `ComposeError`，内部按来源区分分支（便于日志定位），
//! 对外（HTTP 层）统一表现为一次 “compose failed”，并附带原始错误文案。

/// 合成链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// 前景图缺失、Data URL 格式错误或内容不是图片。
    #[error("输入无效：{0}")]
    InvalidInput(String),

    /// 本地背景图不存在或不可读。
    #[error("背景图不可用（not found）：{0}")]
    BackgroundUnavailable(String),

    /// 远程背景图下载失败（超时 / 非 2xx / 内容异常）。
    #[error("背景图下载失败：{0}")]
    BackgroundFetchError(String),

    /// 解码、缩放、合成或编码阶段的意外失败。
    #[error("图像处理失败：{0}")]
    EncodingError(String),

    /// 远程图像生成接口调用失败。
    #[error("远程生成失败：{0}")]
    GenerationFailed(String),

    /// 配置非法（启动期校验）。
    #[error("配置错误：{0}")]
    Config(String),
}

impl ComposeError {
    /// 稳定错误码，用于日志检索。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::BackgroundUnavailable(_) => "E_BACKGROUND_UNAVAILABLE",
            Self::BackgroundFetchError(_) => "E_BACKGROUND_FETCH",
            Self::EncodingError(_) => "E_ENCODING",
            Self::GenerationFailed(_) => "E_GENERATION",
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// 失败所处阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "input",
            Self::BackgroundUnavailable(_) | Self::BackgroundFetchError(_) => "background",
            Self::EncodingError(_) => "compose",
            Self::GenerationFailed(_) => "generate",
            Self::Config(_) => "config",
        }
    }
}
