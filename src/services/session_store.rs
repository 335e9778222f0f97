//! 会话令牌保存 - 业务能力层
//!
//! 只负责"把登录令牌存下来 / 读出来"，相当于浏览器里的 token cookie

use tokio::fs;
use tracing::debug;

use crate::error::AuthError;

/// 会话令牌存储
pub struct SessionStore {
    session_file_path: String,
}

impl SessionStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            session_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.session_file_path
    }

    /// 写入令牌，覆盖旧值
    pub async fn save(&self, token: &str) -> Result<(), AuthError> {
        debug!("保存会话令牌到 {}", self.session_file_path);
        fs::write(&self.session_file_path, token)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// 读取令牌，文件不存在或为空时返回 None
    pub async fn load(&self) -> Result<Option<String>, AuthError> {
        match fs::read_to_string(&self.session_file_path).await {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// 删除令牌（退出登录）
    pub async fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.session_file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> AuthError {
        AuthError::SessionIo {
            path: self.session_file_path.clone(),
            source,
        }
    }
}
