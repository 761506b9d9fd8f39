//! # 放置策略
//!
//! 前景与背景都已解码后，“如何把前景放进背景”由 `PlacementStrategy` 决定：
//! - `DirectPaste`：本地缩放 + alpha 贴图（默认）
//! - `RemoteInpaint`：交给远程图像生成接口按遮罩重绘（见 `inpaint` 模块）

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};

use super::{ComposeError, PlacementBox, pipeline};

#[async_trait]
pub trait PlacementStrategy: Send + Sync {
    /// 日志用名称。
    fn name(&self) -> &'static str;

    async fn place(
        &self,
        foreground: RgbaImage,
        background: RgbImage,
        placement: PlacementBox,
    ) -> Result<DynamicImage, ComposeError>;
}

/// 缩放到放置框尺寸后按 alpha 贴到背景副本上。
pub struct DirectPaste {
    filter: FilterType,
}

impl DirectPaste {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    /// 同步版本，供阻塞线程与测试直接调用。
    pub fn paste(&self, foreground: &RgbaImage, background: &RgbImage, placement: PlacementBox) -> RgbImage {
        let (width, height) = placement.size();
        let resized = pipeline::resize_exact(foreground, width, height, self.filter);
        pipeline::alpha_paste(background, &resized, placement.origin())
    }
}

#[async_trait]
impl PlacementStrategy for DirectPaste {
    fn name(&self) -> &'static str {
        "paste"
    }

    async fn place(
        &self,
        foreground: RgbaImage,
        background: RgbImage,
        placement: PlacementBox,
    ) -> Result<DynamicImage, ComposeError> {
        let paste = DirectPaste::new(self.filter);

        tokio::task::spawn_blocking(move || {
            DynamicImage::ImageRgb8(paste.paste(&foreground, &background, placement))
        })
        .await
        .map_err(|e| ComposeError::EncodingError(format!("合成线程执行失败：{}", e)))
    }
}
