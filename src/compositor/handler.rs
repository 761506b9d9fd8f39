//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `Compositor` 只负责流程编排，不与 HTTP 框架绑定。处理链路固定为：
//! 1. 解析前景 Data URL 并解码为 RGBA
//! 2. 按来源获取背景并解码为 RGB
//! 3. 交给放置策略（直接贴图 / 远程重绘）
//! 4. 编码 PNG，按请求返回原始字节或 Data URL
//!
//! ## 实现思路
//!
//! - 配置在构建时注入，请求之间不共享可变状态。
//! - 背景解析与放置策略都是 trait 对象，按配置选择，测试可替换。
//! - 记录 `load/background/place/encode/total` 阶段耗时，便于性能诊断。

use std::sync::Arc;
use std::time::Instant;

use super::inpaint::RemoteInpaint;
use super::loader::{self, BackgroundResolver, DefaultBackgroundResolver};
use super::source::{BackgroundSource, ComposeOutput, ComposeRequest, OutputFormat};
use super::strategy::{DirectPaste, PlacementStrategy};
use super::{ComposeConfig, ComposeError, PlacementMode, pipeline};

/// 图片合成器。
///
/// 持有配置快照、背景解析器与放置策略；可在多个请求间安全共享。
pub struct Compositor {
    config: ComposeConfig,
    resolver: Arc<dyn BackgroundResolver>,
    strategy: Arc<dyn PlacementStrategy>,
}

impl Compositor {
    /// 根据配置创建合成器。
    ///
    /// 这里同时构建复用型 HTTP 客户端，减少每次请求的初始化开销。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use scene_composer::compositor::{ComposeConfig, Compositor};
    ///
    /// let compositor = Compositor::new(ComposeConfig::default())?;
    /// # Ok::<(), scene_composer::compositor::ComposeError>(())
    /// ```
    pub fn new(config: ComposeConfig) -> Result<Self, ComposeError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ComposeError::Config(format!("无法创建 HTTP 客户端：{}", e)))?;

        let resolver: Arc<dyn BackgroundResolver> = Arc::new(DefaultBackgroundResolver::new(&config, client.clone()));
        let strategy: Arc<dyn PlacementStrategy> = match &config.mode {
            PlacementMode::DirectPaste => Arc::new(DirectPaste::new(config.resize_filter)),
            PlacementMode::RemoteInpaint(inpaint) => Arc::new(RemoteInpaint::new(
                inpaint.clone(),
                client,
                config.max_input_bytes,
                config.max_decoded_pixels,
            )),
        };

        Ok(Self::with_parts(config, resolver, strategy))
    }

    /// 以自定义背景解析器与放置策略组装合成器。
    pub fn with_parts(
        config: ComposeConfig,
        resolver: Arc<dyn BackgroundResolver>,
        strategy: Arc<dyn PlacementStrategy>,
    ) -> Self {
        log::info!(
            "⚙️ 合成器就绪 - strategy={} box={} background={}",
            strategy.name(),
            config.placement,
            config.background_path.display()
        );
        Self {
            config,
            resolver,
            strategy,
        }
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// 处理主入口：解析 → 取背景 → 放置 → 编码。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use scene_composer::compositor::{ComposeConfig, ComposeRequest, Compositor, OutputFormat};
    ///
    /// # async fn demo(data_url: String) -> Result<(), scene_composer::compositor::ComposeError> {
    /// let compositor = Compositor::new(ComposeConfig::default())?;
    /// let _out = compositor
    ///     .compose(ComposeRequest { image: data_url, background: None, format: OutputFormat::DataUrl })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn compose(&self, request: ComposeRequest) -> Result<ComposeOutput, ComposeError> {
        let config = &self.config;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw_foreground = loader::load_foreground(&request.image, config)?;
        let max_pixels = config.max_decoded_pixels;
        let foreground = tokio::task::spawn_blocking(move || pipeline::decode_rgba(&raw_foreground.bytes, max_pixels))
            .await
            .map_err(|e| ComposeError::EncodingError(format!("解码线程执行失败：{}", e)))?
            .map_err(|e| match e {
                ComposeError::EncodingError(msg) => ComposeError::InvalidInput(msg),
                other => other,
            })?;
        let load_elapsed = load_start.elapsed();

        let background_start = Instant::now();
        let source = BackgroundSource::from_override(request.background.as_deref());
        let raw_background = self.resolver.resolve(&source).await?;
        let background_hint = raw_background.source_hint;
        let background = tokio::task::spawn_blocking(move || pipeline::decode_rgb(&raw_background.bytes, max_pixels))
            .await
            .map_err(|e| ComposeError::EncodingError(format!("解码线程执行失败：{}", e)))??;
        let background_elapsed = background_start.elapsed();

        log::debug!(
            "🧩 前景 {}x{}，背景 {}x{}（来源：{}）",
            foreground.width(),
            foreground.height(),
            background.width(),
            background.height(),
            background_hint
        );

        let place_start = Instant::now();
        let composed = self.strategy.place(foreground, background, config.placement).await?;
        let place_elapsed = place_start.elapsed();

        let encode_start = Instant::now();
        let png = tokio::task::spawn_blocking(move || pipeline::encode_png(&composed))
            .await
            .map_err(|e| ComposeError::EncodingError(format!("编码线程执行失败：{}", e)))??;
        let output = match request.format {
            OutputFormat::Png => ComposeOutput::Png(png),
            OutputFormat::DataUrl => ComposeOutput::DataUrl(loader::encode_data_url("image/png", &png)),
        };
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 合成完成 - strategy={} background={} load={}ms background={}ms place={}ms encode={}ms total={}ms",
            self.strategy.name(),
            background_hint,
            load_elapsed.as_millis(),
            background_elapsed.as_millis(),
            place_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(output)
    }
}
