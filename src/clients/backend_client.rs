/// Learnify 后端客户端
///
/// 封装所有与后端 REST 路由相关的调用：笔记、社区、认证，
/// 以及把上传和问答转交给后端的代理路由（密钥只保存在后端）
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::clients::blob_client::read_upload_reply;
use crate::config::Config;
use crate::error::{ApiError, AuthError, SubmissionError, UploadError};
use crate::models::{
    Answer, AuthResponse, Category, ChatReply, ChatRequest, Completion, LoginRequest, NewAnswer,
    NewNote, NewProblem, Note, Problem, SignupRequest,
};
use crate::services::{
    AuthApi, BlobStore, ChatCompletion, CommunityRepository, FileUpload, NotesRepository,
};

/// 后端客户端
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// 创建新的后端客户端
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.backend_base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SubmissionError> {
        let endpoint = self.url(path);
        debug!("GET {} {:?}", endpoint, query);

        let response = self
            .http
            .get(&endpoint)
            .query(query)
            .send()
            .await
            .map_err(|e| SubmissionError::RequestFailed {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        decode_response(&endpoint, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SubmissionError> {
        let endpoint = self.url(path);
        debug!("POST {}", endpoint);

        let response = self
            .http
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| SubmissionError::RequestFailed {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        decode_response(&endpoint, response).await
    }

    async fn post_auth<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, AuthError> {
        let endpoint = self.url(path);
        debug!("POST {}", endpoint);

        let response = self
            .http
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::RequestFailed {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        // 失败时后端也返回 {message}
        let parsed: Option<AuthResponse> = serde_json::from_str(&text).ok();
        if !status.is_success() {
            let message = parsed
                .map(|r| r.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            warn!("认证请求被拒绝 ({}): {}", status, message);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        parsed.ok_or_else(|| AuthError::Rejected {
            status: status.as_u16(),
            message: "unreadable response".to_string(),
        })
    }
}

/// 检查状态码并解析 JSON，非 2xx 时保留响应正文
async fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, SubmissionError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SubmissionError::RequestFailed {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

    if !status.is_success() {
        warn!("后端返回错误 ({}): {}", endpoint, status);
        return Err(SubmissionError::BadStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| SubmissionError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl NotesRepository for BackendClient {
    async fn create_note(&self, note: NewNote) -> Result<Note, SubmissionError> {
        self.post_json("/notes", &note).await
    }

    async fn list_notes(&self, category: Option<Category>) -> Result<Vec<Note>, SubmissionError> {
        match category {
            Some(category) => {
                self.get_json("/notes", &[("category", category.label())])
                    .await
            }
            None => self.get_json("/notes", &[]).await,
        }
    }
}

#[async_trait]
impl CommunityRepository for BackendClient {
    async fn list_problems(&self) -> Result<Vec<Problem>, SubmissionError> {
        self.get_json("/problems", &[]).await
    }

    async fn create_problem(&self, problem: NewProblem) -> Result<Problem, SubmissionError> {
        self.post_json("/problems", &problem).await
    }

    async fn create_answer(&self, answer: NewAnswer) -> Result<Answer, SubmissionError> {
        self.post_json("/answers", &answer).await
    }
}

#[async_trait]
impl AuthApi for BackendClient {
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        self.post_auth("/login", &request).await
    }

    async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, AuthError> {
        self.post_auth("/signup", &request).await
    }
}

#[async_trait]
impl BlobStore for BackendClient {
    async fn upload(&self, file: FileUpload) -> Result<String, UploadError> {
        let endpoint = self.url("/upload");
        debug!("通过后端代理上传 {}", file.file_name);

        let form = Form::new().part("file", Part::bytes(file.bytes).file_name(file.file_name));
        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::RequestFailed {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        read_upload_reply(&endpoint, response).await
    }
}

#[async_trait]
impl ChatCompletion for BackendClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ApiError> {
        let endpoint = self.url("/chat");
        let response = self
            .http
            .post(&endpoint)
            .json(&ChatRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed { source: e })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| ApiError::Decode {
                message: e.to_string(),
            })?;

        // 后端已经还原过转义字符
        Ok(Completion { text: reply.text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = BackendClient::with_base_url("http://localhost:5000/");
        assert_eq!(client.url("/notes"), "http://localhost:5000/notes");
    }
}
