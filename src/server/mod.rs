//! Learnify 后端
//!
//! ## 职责
//!
//! 1. **集合路由**：笔记、问题、回答、用户
//! 2. **代理路由**：`/upload`、`/chat`，上传预设和 API 密钥只留在服务端
//! 3. **跨域策略**：只允许配置的前端来源
//! 4. **数据快照**：可选的 JSON 数据文件

pub mod extract;
pub mod routes;
pub mod store;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::clients::{CloudinaryClient, GeminiClient};
use crate::config::Config;
use crate::services::{BlobStore, ChatCompletion};
use crate::utils::logging::log_server_startup;

pub use extract::JsonBody;
pub use routes::{build_router, cors_layer, ServerError};
pub use store::MemoryStore;

/// 所有处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub chat: Arc<dyn ChatCompletion>,
}

impl AppState {
    /// 按配置创建存储与两个上游客户端
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = match &config.data_file {
            Some(path) => MemoryStore::open(path)
                .await
                .with_context(|| format!("无法打开数据文件: {}", path))?,
            None => MemoryStore::new(),
        };

        Ok(Self {
            store: Arc::new(store),
            blob_store: Arc::new(CloudinaryClient::new(config)),
            chat: Arc::new(GeminiClient::new(config)),
        })
    }
}

/// 启动后端，直到进程退出
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let app = build_router(state, &config.allowed_origin)?;

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("无法监听地址: {}", config.server_addr))?;

    log_server_startup(config);
    info!("✓ 服务已就绪: http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
