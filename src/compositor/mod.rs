//! # 图片合成模块（compositor）
//!
//! ## 设计思路
//!
//! 将“输入解析 → 背景获取 → 解码 → 放置 → 编码”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。对外只有一个入口 `Compositor::compose`。
//!
//! - `handler`：编排整条处理流水线（阶段耗时日志）
//! - `loader`：Data URL 解析、背景解析（本地 / 远程）与安全校验
//! - `pipeline`：解码、像素限制、缩放、alpha 贴图、PNG 编码、遮罩
//! - `strategy`：放置策略 trait 与直接贴图实现
//! - `inpaint`：远程图像编辑接口实现的放置策略
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 调用链
//!
//! ```text
//! server::routes::compose（参数适配）
//!    ↓
//! handler.rs（统一编排）
//!    ├─ loader.rs（前景 Data URL + BackgroundResolver）
//!    ├─ pipeline.rs（解码 RGBA / RGB）
//!    ├─ strategy.rs | inpaint.rs（PlacementStrategy）
//!    └─ pipeline.rs（PNG 编码）
//!    ↓
//! ComposeOutput / ComposeError
//! ```

mod config;
mod error;
mod handler;
mod inpaint;
pub mod loader;
pub mod pipeline;
mod source;
pub mod strategy;

pub use config::{ComposeConfig, InpaintConfig, PlacementBox, PlacementMode, default_background_path};
pub use error::ComposeError;
pub use handler::Compositor;
pub use inpaint::RemoteInpaint;
pub use loader::{BackgroundResolver, DefaultBackgroundResolver};
pub use source::{BackgroundSource, ComposeOutput, ComposeRequest, OutputFormat, RawImageData};
pub use strategy::{DirectPaste, PlacementStrategy};
