use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// 表单必填项为空时的统一提示
pub const REQUIRED_MESSAGE: &str = "This field is required";

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 表单校验错误（发生在任何网络请求之前）
    #[error("表单校验失败: {0}")]
    Validation(#[from] ValidationError),
    /// 文件上传错误
    #[error("上传失败: {0}")]
    Upload(#[from] UploadError),
    /// 后端记录创建 / 查询错误
    #[error("提交失败: {0}")]
    Submission(#[from] SubmissionError),
    /// 文本生成 API 错误，原样展示给用户
    #[error("{0}")]
    Api(#[from] ApiError),
    /// 登录 / 注册错误
    #[error("认证失败: {0}")]
    Auth(#[from] AuthError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 服务端数据存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 工作流状态不允许当前操作
    #[error("操作被拒绝: {0}")]
    Workflow(#[from] WorkflowError),
}

/// 按字段收集的校验错误
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// 字段名 → 提示信息
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个字段错误，同一字段只保留第一条
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    /// 字段为空（或只含空白）时记录 "required"
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED_MESSAGE);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn message(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// 没有错误时返回 Ok(())
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// 文件上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 读取本地文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 网络请求失败
    #[error("上传请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 存储服务返回非 2xx
    #[error("存储服务返回错误 {status}: {body}")]
    BadStatus { status: u16, body: String },
    /// 响应中没有 secure_url
    #[error("存储服务响应中缺少 secure_url")]
    MissingUrl,
}

/// 后端 CRUD 请求错误
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("后端返回错误 ({endpoint}): status={status}, body={body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("响应解析失败 ({endpoint}): {message}")]
    Decode { endpoint: String, message: String },
}

/// 文本生成 API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{source}")]
    RequestFailed {
        #[source]
        source: reqwest::Error,
    },
    /// 非 2xx 响应，body 原样保留
    #[error("Error {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("Empty response from the assistant")]
    EmptyCompletion,
    #[error("Unreadable response from the assistant: {message}")]
    Decode { message: String },
}

/// 登录 / 注册错误
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 后端拒绝，message 来自后端
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
    #[error("响应中没有 token")]
    MissingToken,
    #[error("会话文件读写失败 ({path}): {source}")]
    SessionIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置文件解析失败 ({path}): {message}")]
    ParseFailed { path: String, message: String },
    #[error("配置项 {key} 无效: {message}")]
    Invalid { key: String, message: String },
}

/// 服务端数据快照错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("读取数据文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("写入数据文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("数据文件损坏 ({path}): {message}")]
    Corrupt { path: String, message: String },
}

/// 工作流状态冲突
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("文件仍在上传中")]
    UploadInFlight,
    #[error("上一次提交尚未完成")]
    SubmitInFlight,
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建单字段校验错误
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = ValidationError::new();
        err.add(field, message);
        AppError::Validation(err)
    }

    /// 是否为校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keeps_first_message() {
        let mut err = ValidationError::new();
        err.require("subjectCode", "  ");
        err.add("subjectCode", "other");
        err.require("subjectName", "Maths");

        assert_eq!(err.message("subjectCode"), Some(REQUIRED_MESSAGE));
        assert!(!err.contains("subjectName"));
        assert!(err.into_result().is_err());
    }

    #[test]
    fn test_api_error_shows_body_verbatim() {
        let err = AppError::Api(ApiError::BadStatus {
            status: 429,
            body: "{\"error\":\"quota\"}".to_string(),
        });
        assert_eq!(err.to_string(), "Error 429: {\"error\":\"quota\"}");
    }
}
