//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理前景（Data URL）与背景（本地文件 / 远程 URL）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - Data URL：前缀 + `;base64,` 标记 + 解码前体积估算 + 文件签名。
//! - 本地文件：存在性 + metadata 体积限制 + 读取 + 文件签名。
//! - URL：单次 GET（受超时约束）+ 状态码 + 分块读取体积限制 + 文件签名。
//! - 远程失败不会回退到本地文件。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};

use super::source::{BackgroundSource, RawImageData};
use super::{ComposeConfig, ComposeError};

/// 解析后的 Data URL。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// 解析 `data:<mime>;base64,<payload>`。
///
/// 解码前先按 base64 长度估算体积，超过 `max_bytes` 直接拒绝。
pub fn parse_data_url(data: &str, max_bytes: u64) -> Result<DataUrl, ComposeError> {
    let normalized = data.trim();

    let rest = normalized
        .strip_prefix("data:")
        .ok_or_else(|| ComposeError::InvalidInput("image 必须是 Data URL 字符串（data:...）".to_string()))?;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ComposeError::InvalidInput("Data URL 缺少逗号分隔的数据段".to_string()))?;

    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ComposeError::InvalidInput("Data URL 缺少 base64 标记".to_string()))?;

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(ComposeError::InvalidInput("Data URL 数据段为空".to_string()));
    }

    let estimated = estimate_base64_decoded_upper_bound_len(&payload);
    if estimated > max_bytes {
        return Err(ComposeError::InvalidInput(format!(
            "图片预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            max_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| ComposeError::InvalidInput(format!("Base64 解码失败：{}", e)))?;

    Ok(DataUrl {
        mime: mime.to_string(),
        bytes,
    })
}

/// 将字节包装为 Data URL。
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> u64 {
    let len = base64_data.len() as u64;
    len.saturating_add(3) / 4 * 3
}

/// 从 Data URL 加载前景原始字节。
pub(crate) fn load_foreground(data_url: &str, config: &ComposeConfig) -> Result<RawImageData, ComposeError> {
    log::info!("📝 开始解析前景 Data URL（{} 字符）", data_url.len());

    let parsed = parse_data_url(data_url, config.max_input_bytes)?;
    validate_image_signature(&parsed.bytes).map_err(ComposeError::InvalidInput)?;
    log::debug!(
        "✅ 前景 Data URL 解析完成 - mime={} size={:.2}KB",
        if parsed.mime.is_empty() { "<none>" } else { &parsed.mime },
        parsed.bytes.len() as f64 / 1024.0
    );

    Ok(RawImageData {
        bytes: parsed.bytes,
        source_hint: "data-url",
    })
}

/// 通过文件签名（magic bytes）校验输入是否为图片。
///
/// 返回纯文案，由调用方决定映射到哪个错误分支。
pub(crate) fn validate_image_signature(bytes: &[u8]) -> Result<(), String> {
    if bytes.is_empty() {
        return Err("图片内容为空".to_string());
    }

    let kind = infer::get(bytes).ok_or_else(|| "无法识别图片类型".to_string())?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(format!("文件签名不是图片类型：{}", kind.mime_type()));
    }

    Ok(())
}

/// 去掉 query / fragment，避免日志泄露签名参数。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

/// 单次 GET 下载，按块累计并检查体积上限。
///
/// `wrap` 决定失败映射到哪个错误分支（背景下载 / 远程生成）。
pub(crate) async fn download_limited(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
    wrap: fn(String) -> ComposeError,
) -> Result<Vec<u8>, ComposeError> {
    let redacted = redact_url_for_log(url);
    let parsed = reqwest::Url::parse(url).map_err(|e| wrap(format!("URL 无效：{}（{}）", redacted, e)))?;

    let mut response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| wrap(describe_reqwest_error(&e, url)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(wrap(format!(
            "HTTP {} {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("请求失败"),
            redacted
        )));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(wrap(format!(
                "响应体过大：{:.2} MB（限制：{:.2} MB）",
                len as f64 / 1024.0 / 1024.0,
                max_bytes as f64 / 1024.0 / 1024.0
            )));
        }
    }

    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(16 * 1024).min(max_bytes) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| wrap(describe_reqwest_error(&e, url)))?
    {
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > max_bytes {
            return Err(wrap(format!(
                "响应体超过上限 {:.2} MB",
                max_bytes as f64 / 1024.0 / 1024.0
            )));
        }
    }

    Ok(bytes)
}

fn describe_reqwest_error(e: &reqwest::Error, url: &str) -> String {
    let msg = e.to_string().replace(url, &redact_url_for_log(url));
    if e.is_timeout() {
        format!("请求超时：{}", msg)
    } else if e.is_connect() {
        format!("无法连接：{}", msg)
    } else {
        format!("请求失败：{}", msg)
    }
}

/// 背景解析策略。
///
/// 默认实现只有“远程 / 本地”两条路径；测试可注入内存实现。
#[async_trait]
pub trait BackgroundResolver: Send + Sync {
    async fn resolve(&self, source: &BackgroundSource) -> Result<RawImageData, ComposeError>;
}

/// 默认背景解析：远程覆盖优先，否则读取固定本地路径。
pub struct DefaultBackgroundResolver {
    local_path: PathBuf,
    client: reqwest::Client,
    max_bytes: u64,
}

impl DefaultBackgroundResolver {
    pub fn new(config: &ComposeConfig, client: reqwest::Client) -> Self {
        Self {
            local_path: config.background_path.clone(),
            client,
            max_bytes: config.max_input_bytes,
        }
    }

    async fn load_from_url(&self, url: &str) -> Result<RawImageData, ComposeError> {
        log::info!("🌐 开始下载背景图 - URL: {}", redact_url_for_log(url));

        let bytes = download_limited(&self.client, url, self.max_bytes, ComposeError::BackgroundFetchError).await?;
        validate_image_signature(&bytes).map_err(ComposeError::BackgroundFetchError)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    async fn load_from_file(&self, path: &Path) -> Result<RawImageData, ComposeError> {
        log::info!("📁 读取本地背景图 - 路径: {}", path.display());

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                return Err(ComposeError::BackgroundUnavailable(format!("不是文件：{}", path.display())));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ComposeError::BackgroundUnavailable(path.display().to_string()));
            }
            Err(e) => {
                return Err(ComposeError::BackgroundUnavailable(format!(
                    "无法读取文件信息：{}（{}）",
                    path.display(),
                    e
                )));
            }
        };

        if metadata.len() > self.max_bytes {
            return Err(ComposeError::BackgroundUnavailable(format!(
                "背景文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                self.max_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ComposeError::BackgroundUnavailable(format!("无法读取背景文件：{}", e)))?;
        validate_image_signature(&bytes).map_err(ComposeError::BackgroundUnavailable)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }
}

#[async_trait]
impl BackgroundResolver for DefaultBackgroundResolver {
    async fn resolve(&self, source: &BackgroundSource) -> Result<RawImageData, ComposeError> {
        match source {
            BackgroundSource::Remote(url) => self.load_from_url(url).await,
            BackgroundSource::Local => self.load_from_file(&self.local_path).await,
        }
    }
}
