//! # 场景合成服务 — 进程入口
//!
//! 本文件仅负责日志初始化、配置解析与端口绑定。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use clap::Parser;
use scene_composer::compositor::Compositor;
use scene_composer::server::{self, AppState};
use scene_composer::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();
    let config = settings.compose_config();

    if !config.background_path.exists() {
        log::warn!(
            "⚠️ 本地背景图不存在，未提供 background 覆盖的请求将失败：{}",
            config.background_path.display()
        );
    }

    let compositor = Compositor::new(config)?;
    let state = AppState::new(compositor, &settings.allowed_origin)?;
    let app = server::router(state);

    let addr = settings.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("scene-composer listening on http://{addr} (origin={})", settings.allowed_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("scene-composer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("无法监听 Ctrl-C，服务将无法优雅退出: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("收到退出信号，停止接收新请求");
}
