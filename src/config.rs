use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端 REST 服务地址（客户端使用）
    pub backend_base_url: String,
    /// 服务端监听地址
    pub server_addr: String,
    /// 允许跨域的前端来源，`*` 表示开发模式下全部放行
    pub allowed_origin: String,
    /// 服务端数据快照文件（为空时只保存在内存中）
    pub data_file: Option<String>,
    /// 登录令牌保存位置（相当于浏览器 cookie）
    pub session_file: String,
    // --- 文件存储配置 ---
    pub upload_url: String,
    pub upload_preset: String,
    // --- 文本生成 API 配置 ---
    pub chat_endpoint: String,
    pub chat_api_key: String,
    pub chat_temperature: f32,
    pub chat_max_output_tokens: u32,
    /// 回答逐词显示的间隔（毫秒）
    pub reveal_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:5000".to_string(),
            server_addr: "0.0.0.0:5000".to_string(),
            allowed_origin: "https://learnify-project-pied.vercel.app".to_string(),
            data_file: None,
            session_file: ".learnify_session".to_string(),
            upload_url: "https://api.cloudinary.com/v1_1/vikashcloud/raw/upload".to_string(),
            upload_preset: String::new(),
            chat_endpoint:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                    .to_string(),
            chat_api_key: String::new(),
            chat_temperature: 0.7,
            chat_max_output_tokens: 256,
            reveal_delay_ms: 75,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，环境变量优先级更高
    ///
    /// # 参数
    /// - `path`: 配置文件路径
    ///
    /// # 返回
    /// 返回合并后的配置
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(ConfigError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            })
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::ParseFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        Self {
            backend_base_url: std::env::var("LEARNIFY_BACKEND_URL")
                .unwrap_or(self.backend_base_url),
            server_addr: std::env::var("LEARNIFY_SERVER_ADDR").unwrap_or(self.server_addr),
            allowed_origin: std::env::var("LEARNIFY_ALLOWED_ORIGIN").unwrap_or(self.allowed_origin),
            data_file: std::env::var("LEARNIFY_DATA_FILE").ok().or(self.data_file),
            session_file: std::env::var("LEARNIFY_SESSION_FILE").unwrap_or(self.session_file),
            upload_url: std::env::var("UPLOAD_URL").unwrap_or(self.upload_url),
            upload_preset: std::env::var("UPLOAD_PRESET").unwrap_or(self.upload_preset),
            chat_endpoint: std::env::var("CHAT_ENDPOINT").unwrap_or(self.chat_endpoint),
            chat_api_key: std::env::var("CHAT_API_KEY").unwrap_or(self.chat_api_key),
            chat_temperature: std::env::var("CHAT_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.chat_temperature),
            chat_max_output_tokens: std::env::var("CHAT_MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.chat_max_output_tokens),
            reveal_delay_ms: std::env::var("REVEAL_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.reveal_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_toml_missing_keys_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend_base_url = \"http://127.0.0.1:9000\"").unwrap();
        writeln!(file, "chat_max_output_tokens = 512").unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();

        assert_eq!(config.backend_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.chat_max_output_tokens, 512);
        assert_eq!(config.reveal_delay_ms, 75);
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_toml_parse_error_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reveal_delay_ms = \"fast\"").unwrap();

        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::ParseFailed { .. })));
    }
}
