//! # 场景合成服务 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            前端（导出商品透明 PNG → Data URL）            │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ HTTP (POST /compose, JSON)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ server ───── axum 路由 + CORS 注入                    │
//! │  │                                                       │
//! │  ├─ error ────── AppError（状态码 / JSON 错误信封）        │
//! │  │                                                       │
//! │  ├─ compositor ─ 解析·取背景·缩放·贴图·编码               │
//! │  │   ├─ loader          Data URL / 本地 / 远程背景         │
//! │  │   ├─ pipeline        解码·缩放·alpha 混合·PNG           │
//! │  │   └─ strategy        直接贴图 | 远程重绘                │
//! │  │                                                       │
//! │  └─ settings ─── 命令行 / 环境变量配置                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`compositor`] | 单次请求的图片合成流水线，无跨请求状态 |
//! | [`error`] | 统一错误类型 `AppError`，负责映射 HTTP 状态码 |
//! | [`server`] | 路由、请求体解析、响应编码、CORS |
//! | [`settings`] | 进程启动时解析一次的配置 |

pub mod compositor;
pub mod error;
pub mod server;
pub mod settings;
