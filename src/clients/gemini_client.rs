/// 文本生成 API 客户端
///
/// 封装 generateContent 调用，温度与输出长度固定来自配置
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Completion, GenerateRequest, GenerateResponse, GenerationConfig};
use crate::services::{unescape_text, ChatCompletion};
use crate::utils::logging::truncate_text;

/// 文本生成客户端
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// 创建新的文本生成客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.chat_endpoint.clone(),
            api_key: config.chat_api_key.clone(),
            generation: GenerationConfig {
                temperature: config.chat_temperature,
                max_output_tokens: config.chat_max_output_tokens,
            },
        }
    }

    /// 构建请求体
    pub fn build_request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest::single_prompt(prompt, self.generation)
    }
}

#[async_trait]
impl ChatCompletion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, ApiError> {
        debug!("调用文本生成 API，提示词: {}", truncate_text(prompt, 80));

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed { source: e })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("文本生成 API 返回错误: {}", status);
            return Err(ApiError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::RequestFailed { source: e })?;

        parse_completion(&body)
    }
}

/// 从原始响应中取出第一段文本并还原转义
pub fn parse_completion(body: &str) -> Result<Completion, ApiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;

    let text = parsed.first_text().ok_or(ApiError::EmptyCompletion)?;
    debug!("文本生成成功，长度 {} 字符", text.len());

    Ok(Completion {
        text: unescape_text(text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let client = GeminiClient::new(&Config::default());
        let body = serde_json::to_value(client.build_request("What is Rust?")).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "What is Rust?");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_parse_completion_unescapes() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"line1\\nline2"}]}}]}"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.text, "line1\nline2");
    }

    #[test]
    fn test_parse_completion_without_candidates() {
        let err = parse_completion(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, ApiError::EmptyCompletion));
    }

    /// 本地模拟的生成接口：key=good 时回答，否则返回 403 原始正文
    async fn spawn_fake_model() -> String {
        use axum::extract::Query;
        use axum::http::StatusCode;
        use axum::response::IntoResponse;
        use axum::routing::post;
        use axum::{Json, Router};
        use std::collections::HashMap;

        async fn generate(
            Query(query): Query<HashMap<String, String>>,
            Json(request): Json<GenerateRequest>,
        ) -> axum::response::Response {
            if query.get("key").map(String::as_str) != Some("good") {
                return (StatusCode::FORBIDDEN, "API key not valid").into_response();
            }
            let prompt = &request.contents[0].parts[0].text;
            Json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": format!("echo:\\n{}", prompt) }] } }]
            }))
            .into_response()
        }

        let app = Router::new().route("/generate", post(generate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/generate", addr)
    }

    fn client_for(endpoint: String, key: &str) -> GeminiClient {
        GeminiClient::new(&Config {
            chat_endpoint: endpoint,
            chat_api_key: key.to_string(),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_complete_sends_key_and_unescapes() {
        let client = client_for(spawn_fake_model().await, "good");
        let completion = client.complete("hi").await.unwrap();
        assert_eq!(completion.text, "echo:\nhi");
    }

    #[tokio::test]
    async fn test_rejected_key_keeps_body_verbatim() {
        let client = client_for(spawn_fake_model().await, "bad");
        let err = client.complete("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Error 403: API key not valid");
    }

    #[tokio::test]
    #[ignore] // 需要真实的 CHAT_API_KEY：cargo test -- --ignored
    async fn test_real_completion() {
        let _ = tracing_subscriber::fmt::try_init();
        let client = GeminiClient::new(&Config::from_env());

        let completion = client.complete("Say hello in one word").await.unwrap();
        println!("回答: {}", completion.text);
        assert!(!completion.text.is_empty());
    }
}
