//! # 配置模块
//!
//! ## 设计思路
//!
//! 所有“可调策略”集中在 `ComposeConfig`，进程启动时构建一次并注入 `Compositor`，
//! 不再依赖模块级全局变量（背景路径、放置框、HTTP 客户端）。
//!
//! ## 实现思路
//!
//! - `PlacementBox` 描述背景坐标系中的放置矩形，退化矩形在取尺寸时钳制为 1×1。
//! - `PlacementMode` 决定使用直接贴图还是远程重绘（inpaint）。
//! - `Default` 提供与线上一致的默认参数。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use image::imageops::FilterType;

use super::ComposeError;

/// 背景中的放置矩形 `(x1, y1, x2, y2)`，单位为像素。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PlacementBox {
    /// 默认场景（咖啡馆桌面）的放置区域。
    pub const DEFAULT: Self = Self::new(600, 680, 940, 1080);

    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 缩放目标尺寸，至少 1×1。
    pub fn size(&self) -> (u32, u32) {
        (
            self.x2.saturating_sub(self.x1).max(1),
            self.y2.saturating_sub(self.y1).max(1),
        )
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.x1, self.y1)
    }
}

impl Default for PlacementBox {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PlacementBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl FromStr for PlacementBox {
    type Err = ComposeError;

    /// 解析 `"x1,y1,x2,y2"`。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ComposeError::Config(format!("放置框坐标无法解析：{}（{}）", s, e)))?;

        match parts.as_slice() {
            &[x1, y1, x2, y2] => Ok(Self::new(x1, y1, x2, y2)),
            _ => Err(ComposeError::Config(format!(
                "放置框需要 4 个坐标（x1,y1,x2,y2），实际：{}",
                s
            ))),
        }
    }
}

/// 远程重绘接口配置。
#[derive(Debug, Clone)]
pub struct InpaintConfig {
    /// 图像编辑接口地址。
    pub endpoint: String,
    /// Bearer 鉴权密钥。
    pub api_key: String,
    pub model: String,
    /// 交给模型的自然语言指令。
    pub prompt: String,
    /// 输出尺寸参数（如 `"1024x1024"` / `"auto"`）。
    pub size: String,
    pub timeout: Duration,
}

impl InpaintConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/images/edits";
    pub const DEFAULT_MODEL: &'static str = "gpt-image-1";
    pub const DEFAULT_PROMPT: &'static str = "Place the product from the additional image \
        naturally inside the masked region of the scene. Match the scene's lighting, \
        perspective and shadows, keep the product's shape, colors and logo unchanged, \
        and leave everything outside the mask untouched.";

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            prompt: Self::DEFAULT_PROMPT.to_string(),
            size: "auto".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// 放置策略选择。
#[derive(Debug, Clone, Default)]
pub enum PlacementMode {
    /// 缩放后按 alpha 直接贴到背景上。
    #[default]
    DirectPaste,
    /// 交给远程图像生成接口按遮罩重绘。
    RemoteInpaint(InpaintConfig),
}

impl PlacementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectPaste => "paste",
            Self::RemoteInpaint(_) => "inpaint",
        }
    }
}

/// 合成配置。
///
/// 字段覆盖输入限制、背景获取、缩放与放置策略四部分。
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    pub placement: PlacementBox,
    /// 本地背景图路径（未提供远程覆盖时使用）。
    pub background_path: PathBuf,
    /// 远程背景下载总超时。
    pub fetch_timeout: Duration,
    /// 建立连接（TCP/TLS）超时。
    pub connect_timeout: Duration,
    /// Data URL 解码后 / 背景文件 / 下载体积上限（字节）。
    pub max_input_bytes: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 前景缩放滤镜。
    pub resize_filter: FilterType,
    pub mode: PlacementMode,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            placement: PlacementBox::DEFAULT,
            background_path: default_background_path(),
            fetch_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_input_bytes: 25 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            resize_filter: FilterType::Lanczos3,
            mode: PlacementMode::DirectPaste,
        }
    }
}

impl ComposeConfig {
    /// 启动期校验，失败即拒绝启动。
    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.max_input_bytes == 0 {
            return Err(ComposeError::Config("max_input_bytes 不能为 0".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ComposeError::Config("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ComposeError::Config("fetch_timeout 不能为 0".to_string()));
        }
        if let PlacementMode::RemoteInpaint(inpaint) = &self.mode {
            if inpaint.api_key.trim().is_empty() {
                return Err(ComposeError::Config(
                    "inpaint 模式需要配置 API Key（OPENAI_API_KEY）".to_string(),
                ));
            }
            if !inpaint.endpoint.starts_with("http://") && !inpaint.endpoint.starts_with("https://") {
                return Err(ComposeError::Config(format!(
                    "inpaint 接口地址必须是 http(s)：{}",
                    inpaint.endpoint
                )));
            }
        }
        Ok(())
    }
}

/// 安装目录下的默认背景图。
pub fn default_background_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("public")
        .join("scenes")
        .join("cafe.jpg")
}
