/// 对象存储客户端
///
/// 使用预设的匿名上传策略（upload preset）直接上传到存储服务
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::UploadError;
use crate::models::UploadReply;
use crate::services::{BlobStore, FileUpload};

/// 对象存储客户端
pub struct CloudinaryClient {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryClient {
    /// 创建新的存储客户端
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(&config.upload_url, &config.upload_preset)
    }

    pub fn with_endpoint(upload_url: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
        }
    }

    fn build_form(&self, file: FileUpload) -> Form {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
    }
}

#[async_trait]
impl BlobStore for CloudinaryClient {
    async fn upload(&self, file: FileUpload) -> Result<String, UploadError> {
        debug!(
            "上传文件 {} ({} 字节) 到 {}",
            file.file_name,
            file.bytes.len(),
            self.upload_url
        );

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(self.build_form(file))
            .send()
            .await
            .map_err(|e| UploadError::RequestFailed {
                endpoint: self.upload_url.clone(),
                source: e,
            })?;

        read_upload_reply(&self.upload_url, response).await
    }
}

/// 解析存储服务（或 `/upload` 代理）的响应
pub(crate) async fn read_upload_reply(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<String, UploadError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("上传失败 ({}): {} {}", endpoint, status, body);
        return Err(UploadError::BadStatus {
            status: status.as_u16(),
            body,
        });
    }

    let reply: UploadReply = response
        .json()
        .await
        .map_err(|e| UploadError::RequestFailed {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

    match reply.secure_url {
        Some(url) if !url.is_empty() => {
            debug!("上传成功: {}", url);
            Ok(url)
        }
        _ => Err(UploadError::MissingUrl),
    }
}
