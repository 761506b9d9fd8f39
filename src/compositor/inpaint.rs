//! # 远程重绘策略
//!
//! 将背景、遮罩（黑底白框）与前景一起提交给图像编辑接口，由模型把前景“自然地”
//! 放进遮罩区域。请求形态跟随服务方接口，字段如下：
//!
//! ```text
//! POST {endpoint}            Authorization: Bearer {api_key}
//! multipart:
//!   model, prompt, size
//!   image[]  = background.png
//!   image[]  = product.png     （附加参考图）
//!   mask     = mask.png
//! → {"data": [{"b64_json": "..."} | {"url": "..."}]}
//! ```

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::Deserialize;

use super::loader::{self, download_limited};
use super::strategy::PlacementStrategy;
use super::{ComposeError, InpaintConfig, PlacementBox, pipeline};

#[derive(Debug, Deserialize)]
struct EditResponse {
    #[serde(default)]
    data: Vec<EditImage>,
}

#[derive(Debug, Deserialize)]
struct EditImage {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// 远程图像编辑接口实现的放置策略。
pub struct RemoteInpaint {
    config: InpaintConfig,
    client: reqwest::Client,
    max_result_bytes: u64,
    max_decoded_pixels: u64,
}

impl RemoteInpaint {
    pub fn new(config: InpaintConfig, client: reqwest::Client, max_result_bytes: u64, max_decoded_pixels: u64) -> Self {
        Self {
            config,
            client,
            max_result_bytes,
            max_decoded_pixels,
        }
    }

    fn png_part(bytes: Vec<u8>, file_name: &'static str) -> Result<reqwest::multipart::Part, ComposeError> {
        reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ComposeError::GenerationFailed(format!("构建 multipart 失败：{}", e)))
    }

    /// 把接口返回的第一张图取成原始字节。
    async fn extract_image_bytes(&self, body: EditResponse) -> Result<Vec<u8>, ComposeError> {
        let first = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ComposeError::GenerationFailed("接口未返回图片".to_string()))?;

        match (first.b64_json, first.url) {
            (Some(b64), _) => general_purpose::STANDARD
                .decode(b64.trim())
                .map_err(|e| ComposeError::GenerationFailed(format!("结果 Base64 解码失败：{}", e))),
            (None, Some(url)) => {
                log::info!("🌐 下载生成结果 - URL: {}", loader::redact_url_for_log(&url));
                download_limited(&self.client, &url, self.max_result_bytes, ComposeError::GenerationFailed).await
            }
            (None, None) => Err(ComposeError::GenerationFailed("结果中既没有 b64_json 也没有 url".to_string())),
        }
    }
}

#[async_trait]
impl PlacementStrategy for RemoteInpaint {
    fn name(&self) -> &'static str {
        "inpaint"
    }

    async fn place(
        &self,
        foreground: RgbaImage,
        background: RgbImage,
        placement: PlacementBox,
    ) -> Result<DynamicImage, ComposeError> {
        let (background_png, mask_png, foreground_png) = tokio::task::spawn_blocking(move || {
            let mask = pipeline::make_mask(background.dimensions(), placement);
            Ok::<_, ComposeError>((
                pipeline::encode_png(&DynamicImage::ImageRgb8(background))?,
                pipeline::encode_png(&DynamicImage::ImageLuma8(mask))?,
                pipeline::encode_png(&DynamicImage::ImageRgba8(foreground))?,
            ))
        })
        .await
        .map_err(|e| ComposeError::EncodingError(format!("编码线程执行失败：{}", e)))??;

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("prompt", self.config.prompt.clone())
            .text("size", self.config.size.clone())
            .part("image[]", Self::png_part(background_png, "background.png")?)
            .part("image[]", Self::png_part(foreground_png, "product.png")?)
            .part("mask", Self::png_part(mask_png, "mask.png")?);

        log::info!(
            "🪄 调用远程重绘接口 - {} model={} box={}",
            loader::redact_url_for_log(&self.config.endpoint),
            self.config.model,
            placement
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ComposeError::GenerationFailed(format!("接口超时（{}秒）", self.config.timeout.as_secs()))
                } else {
                    ComposeError::GenerationFailed(format!("请求失败：{}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ComposeError::GenerationFailed(format!("读取响应失败：{}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| text.chars().take(200).collect());
            return Err(ComposeError::GenerationFailed(format!("HTTP {}：{}", status.as_u16(), detail)));
        }

        let body: EditResponse = serde_json::from_str(&text)
            .map_err(|e| ComposeError::GenerationFailed(format!("响应 JSON 解析失败：{}", e)))?;
        let bytes = self.extract_image_bytes(body).await?;
        loader::validate_image_signature(&bytes).map_err(ComposeError::GenerationFailed)?;

        let max_pixels = self.max_decoded_pixels;
        let decoded = tokio::task::spawn_blocking(move || pipeline::decode_rgba(&bytes, max_pixels))
            .await
            .map_err(|e| ComposeError::EncodingError(format!("解码线程执行失败：{}", e)))??;

        Ok(DynamicImage::ImageRgba8(decoded))
    }
}
