//! # 数据源与中间模型
//!
//! 将“外部输入语义”和“流水线中间结果”解耦：
//! - `BackgroundSource` 表示背景来源
//! - `RawImageData` 表示已加载但未解码的字节
//! - `ComposeRequest` / `ComposeOutput` 是合成器的入参与出参

/// 背景来源，只有两条终止路径，互不回退。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    /// 调用方提供的 http(s) 覆盖地址。
    Remote(String),
    /// 配置中的本地背景文件。
    Local,
}

impl BackgroundSource {
    /// 仅当覆盖值以 `http://` 或 `https://` 开头时走远程，其他值一律忽略。
    pub fn from_override(url: Option<&str>) -> Self {
        match url.map(str::trim) {
            Some(u) if u.starts_with("http://") || u.starts_with("https://") => {
                Self::Remote(u.to_string())
            }
            _ => Self::Local,
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
#[derive(Debug, Clone)]
pub struct RawImageData {
    pub bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub source_hint: &'static str,
}

/// 结果返回形式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 原始 PNG 字节。
    #[default]
    Png,
    /// `data:image/png;base64,...` 字符串。
    DataUrl,
}

/// 一次合成请求。
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    /// 前景图 Data URL。
    pub image: String,
    /// 可选的背景覆盖地址。
    pub background: Option<String>,
    pub format: OutputFormat,
}

/// 合成结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutput {
    Png(Vec<u8>),
    DataUrl(String),
}
