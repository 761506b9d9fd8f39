//! 进程级配置：命令行参数优先，其次环境变量，最后是内置默认值。
//! 启动时解析一次，之后只读。

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::compositor::{ComposeConfig, ComposeError, InpaintConfig, PlacementBox, PlacementMode, default_background_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// 本地缩放 + alpha 贴图
    Paste,
    /// 远程图像编辑接口重绘
    Inpaint,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "scene-composer", about = "Composite product images onto a background scene")]
pub struct Settings {
    /// 监听端口
    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// 监听地址
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// CORS 允许的来源
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "*")]
    pub allowed_origin: String,

    /// 本地背景图路径
    #[arg(long, env = "BACKGROUND_PATH", default_value_os_t = default_background_path())]
    pub background_path: PathBuf,

    /// 放置框 x1,y1,x2,y2
    #[arg(long = "box", env = "COMPOSE_BOX", default_value_t = PlacementBox::DEFAULT)]
    pub placement: PlacementBox,

    #[arg(long, env = "COMPOSE_STRATEGY", value_enum, default_value_t = StrategyKind::Paste)]
    pub strategy: StrategyKind,

    /// 远程背景下载超时（秒）
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// 单张输入图片体积上限（MB）
    #[arg(long, env = "MAX_INPUT_MB", default_value_t = 25)]
    pub max_input_mb: u64,

    #[arg(long, env = "INPAINT_API_URL", default_value = InpaintConfig::DEFAULT_ENDPOINT)]
    pub inpaint_endpoint: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    #[arg(long, env = "INPAINT_MODEL", default_value = InpaintConfig::DEFAULT_MODEL)]
    pub inpaint_model: String,

    /// 覆盖默认重绘指令
    #[arg(long, env = "INPAINT_PROMPT")]
    pub inpaint_prompt: Option<String>,
}

impl Settings {
    pub fn bind_addr(&self) -> Result<SocketAddr, ComposeError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ComposeError::Config(format!("监听地址无效：{}:{}（{}）", self.host, self.port, e)))
    }

    /// 组装合成器配置。
    pub fn compose_config(&self) -> ComposeConfig {
        let mode = match self.strategy {
            StrategyKind::Paste => PlacementMode::DirectPaste,
            StrategyKind::Inpaint => {
                let mut inpaint = InpaintConfig::with_api_key(self.api_key.clone());
                inpaint.endpoint = self.inpaint_endpoint.clone();
                inpaint.model = self.inpaint_model.clone();
                if let Some(prompt) = &self.inpaint_prompt {
                    inpaint.prompt = prompt.clone();
                }
                PlacementMode::RemoteInpaint(inpaint)
            }
        };

        ComposeConfig {
            placement: self.placement,
            background_path: self.background_path.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_input_bytes: self.max_input_mb.saturating_mul(1024 * 1024),
            mode,
            ..ComposeConfig::default()
        }
    }
}
