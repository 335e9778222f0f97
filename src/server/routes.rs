//! REST 路由
//!
//! 每个处理函数只做三件事：校验请求、调用存储或代理能力、把结果转成 JSON。
//! 校验失败（包括请求体无法解析）统一返回 400 `{message, fields}`。

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{ApiError, ConfigError, StorageError, UploadError, ValidationError};
use crate::models::{
    Answer, AuthResponse, Category, ChatReply, ChatRequest, LoginRequest, NewAnswer, NewNote,
    NewProblem, Note, NoteField, Problem, SignupRequest, UploadReply,
};
use crate::server::{AppState, JsonBody};
use crate::services::FileUpload;
use crate::utils::truncate_text;

/// 上传文件大小上限
const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// 处理函数的错误响应
#[derive(Debug)]
pub enum ServerError {
    Validation(ValidationError),
    NotFound(&'static str),
    Conflict(&'static str),
    Unauthorized(&'static str),
    /// 上游服务返回的错误，状态码与正文原样转发
    Upstream { status: StatusCode, body: String },
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Validation failed", "fields": errors.fields })),
            )
                .into_response(),
            ServerError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
            }
            ServerError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "message": message }))).into_response()
            }
            ServerError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
            }
            ServerError::Upstream { status, body } => (status, body).into_response(),
            ServerError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "message": message }))).into_response()
            }
            ServerError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": message })),
            )
                .into_response(),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(errors: ValidationError) -> Self {
        ServerError::Validation(errors)
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        error!("存储写入失败: {}", e);
        ServerError::Internal("Internal error".to_string())
    }
}

type HandlerResult<T> = Result<T, ServerError>;

/// 构建 CORS 策略，`*` 表示开发环境下允许任意来源
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, ConfigError> {
    if allowed_origin.trim() == "*" {
        return Ok(CorsLayer::permissive());
    }

    let origin = HeaderValue::from_str(allowed_origin.trim()).map_err(|e| ConfigError::Invalid {
        key: "allowed_origin".to_string(),
        message: e.to_string(),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

/// 构建全部路由
///
/// # 参数
/// - `state`: 共享状态
/// - `allowed_origin`: 允许的跨域来源
pub fn build_router(state: AppState, allowed_origin: &str) -> Result<Router, ConfigError> {
    let router = Router::new()
        .route("/health", get(health))
        .route("/notes", get(list_notes).post(create_note))
        .route("/problems", get(list_problems).post(create_problem))
        .route("/answers", post(create_answer))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/chat", post(chat))
        .layer(cors_layer(allowed_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "message": "Learnify API is alive" }))
}

#[derive(Debug, Deserialize)]
struct NotesQuery {
    category: Option<String>,
}

async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<NotesQuery>,
) -> HandlerResult<Json<Vec<Note>>> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let parsed = raw.parse::<Category>().map_err(|message| {
                let mut errors = ValidationError::new();
                errors.add("category", message);
                errors
            })?;
            Some(parsed)
        }
    };

    Ok(Json(state.store.list_notes(category).await))
}

async fn create_note(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewNote>,
) -> HandlerResult<(StatusCode, Json<Note>)> {
    let mut errors = ValidationError::new();
    errors.require(NoteField::SubjectCode.name(), &new.subject_code);
    errors.require(NoteField::SubjectName.name(), &new.subject_name);
    errors.require(NoteField::File.name(), &new.file);
    errors.into_result()?;

    let note = state.store.insert_note(new).await?;
    info!("📄 新笔记: {} ({})", note.subject_code, note.category);
    Ok((StatusCode::CREATED, Json(note)))
}

async fn list_problems(State(state): State<AppState>) -> Json<Vec<Problem>> {
    Json(state.store.list_problems().await)
}

async fn create_problem(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewProblem>,
) -> HandlerResult<(StatusCode, Json<Problem>)> {
    let mut errors = ValidationError::new();
    errors.require("problem", &new.problem);
    errors.into_result()?;

    let problem = state.store.insert_problem(new.problem.trim()).await?;
    info!("❓ 新问题: {}", truncate_text(&problem.problem, 60));
    Ok((StatusCode::CREATED, Json(problem)))
}

async fn create_answer(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewAnswer>,
) -> HandlerResult<(StatusCode, Json<Answer>)> {
    let mut errors = ValidationError::new();
    errors.require("problemId", &new.problem_id);
    errors.require("name", &new.name);
    errors.require("answer", &new.answer);
    errors.into_result()?;

    let problem_id = new.problem_id.clone();
    match state.store.insert_answer(new).await? {
        Some(answer) => {
            info!("💬 问题 {} 有了新回答", problem_id);
            Ok((StatusCode::CREATED, Json(answer)))
        }
        None => {
            warn!("回答的问题不存在: {}", problem_id);
            Err(ServerError::NotFound("Problem not found"))
        }
    }
}

async fn signup(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> HandlerResult<(StatusCode, Json<AuthResponse>)> {
    request.validate().into_result()?;

    let phone = request.phone.clone();
    let token = state
        .store
        .register(request)
        .await?
        .ok_or(ServerError::Conflict("User already exists"))?;

    info!("👤 新用户注册: {}", phone);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: Some(token),
            message: "Signup successful".to_string(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> HandlerResult<Json<AuthResponse>> {
    request.validate().into_result()?;

    let token = state
        .store
        .authenticate(&request)
        .await
        .ok_or(ServerError::Unauthorized("Invalid phone or password"))?;

    Ok(Json(AuthResponse {
        token: Some(token),
        message: "Login successful".to_string(),
    }))
}

/// 取出 multipart 里的 `file` 字段并转交给文件存储
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> HandlerResult<Json<UploadReply>> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        file = Some(FileUpload::new(file_name, bytes.to_vec()));
    }

    let Some(file) = file else {
        let mut errors = ValidationError::new();
        errors.require("file", "");
        return Err(errors.into());
    };

    info!("📤 代理上传: {} ({} 字节)", file.file_name, file.bytes.len());
    match state.blob_store.upload(file).await {
        Ok(url) => Ok(Json(UploadReply {
            secure_url: Some(url),
        })),
        Err(UploadError::BadStatus { status, body }) => Err(ServerError::Upstream {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        }),
        Err(e) => {
            error!("代理上传失败: {}", e);
            Err(ServerError::BadGateway(e.to_string()))
        }
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ServerError {
    let mut errors = ValidationError::new();
    errors.add("file", e.body_text());
    ServerError::Validation(errors)
}

async fn chat(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> HandlerResult<Json<ChatReply>> {
    let mut errors = ValidationError::new();
    errors.require("prompt", &request.prompt);
    errors.into_result()?;

    match state.chat.complete(&request.prompt).await {
        Ok(completion) => Ok(Json(ChatReply {
            text: completion.text,
        })),
        Err(ApiError::BadStatus { status, body }) => {
            warn!("文本生成 API 返回 {}", status);
            Err(ServerError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            })
        }
        Err(e) => {
            error!("文本生成失败: {}", e);
            Err(ServerError::BadGateway(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Completion;
    use crate::server::MemoryStore;
    use crate::services::{BlobStore, ChatCompletion};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FixedBlob;

    #[async_trait]
    impl BlobStore for FixedBlob {
        async fn upload(&self, file: FileUpload) -> Result<String, UploadError> {
            Ok(format!("https://cdn.example/raw/{}", file.file_name))
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatCompletion for EchoChat {
        async fn complete(&self, prompt: &str) -> Result<Completion, ApiError> {
            if prompt == "quota" {
                return Err(ApiError::BadStatus {
                    status: 429,
                    body: "quota exceeded".to_string(),
                });
            }
            Ok(Completion {
                text: format!("you said {}", prompt),
            })
        }
    }

    fn app() -> Router {
        app_for_origin("*")
    }

    fn app_for_origin(origin: &str) -> Router {
        let state = AppState {
            store: Arc::new(MemoryStore::new()),
            blob_store: Arc::new(FixedBlob),
            chat: Arc::new(EchoChat),
        };
        build_router(state, origin).unwrap()
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_answer_for_unknown_problem_is_404() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/answers",
            json!({ "problemId": "nope", "name": "A", "answer": "B" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Problem not found");
    }

    #[tokio::test]
    async fn test_answers_embedded_in_problem_list() {
        let app = app();
        let (status, problem) = send(
            &app,
            Method::POST,
            "/problems",
            json!({ "problem": "What is a trait?" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = problem["_id"].as_str().unwrap().to_string();

        for (name, text) in [("Asha", "An interface"), ("Ben", "A set of methods")] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/answers",
                json!({ "problemId": id, "name": name, "answer": text }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, list) = send(&app, Method::GET, "/problems", json!(null)).await;
        assert_eq!(status, StatusCode::OK);
        let answers = list[0]["answers"].as_array().unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0]["name"], "Asha");
        assert_eq!(answers[1]["name"], "Ben");
    }

    #[tokio::test]
    async fn test_note_without_file_is_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/notes",
            json!({
                "subjectCode": "CS1",
                "subjectName": "Intro",
                "year": "1",
                "category": "Books",
                "file": ""
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"]["file"], "This field is required");
    }

    #[tokio::test]
    async fn test_notes_filtered_by_category() {
        let app = app();
        for category in ["Books", "Previous Year"] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/notes",
                json!({
                    "subjectCode": "CS1",
                    "subjectName": "Intro",
                    "year": 2,
                    "category": category,
                    "file": "https://cdn.example/x.pdf"
                }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, notes) = send(
            &app,
            Method::GET,
            "/notes?category=Previous%20Year",
            json!(null),
        )
        .await;
        assert_eq!(notes.as_array().unwrap().len(), 1);
        assert_eq!(notes[0]["year"], "2");

        let (_, all) = send(&app, Method::GET, "/notes?category=", json!(null)).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (status, _) = send(&app, Method::GET, "/notes?category=Papers", json!(null)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_signup_conflict_and_login() {
        let app = app();
        let user = json!({
            "name": "Dev",
            "phone": "9123456780",
            "studentYear": "3",
            "password": "password123"
        });

        let (status, body) = send(&app, Method::POST, "/signup", user.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].is_string());

        let (status, _) = send(&app, Method::POST, "/signup", user).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            Method::POST,
            "/login",
            json!({ "phone": "9123456780", "password": "password124" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid phone or password");

        let (status, _) = send(
            &app,
            Method::POST,
            "/login",
            json!({ "phone": "9123456780", "password": "password123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_proxy_forwards_upstream_error() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/chat", json!({ "prompt": "hi" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "you said hi");

        let request = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "prompt": "quota" }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"quota exceeded");
    }

    #[tokio::test]
    async fn test_upload_proxy() {
        let app = app();
        let boundary = "learnifyboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"os.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let reply: UploadReply = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reply.secure_url.as_deref(), Some("https://cdn.example/raw/os.pdf"));
    }

    #[tokio::test]
    async fn test_note_missing_file_key_is_400() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/notes",
            json!({
                "subjectCode": "CS1",
                "subjectName": "Intro",
                "year": "1",
                "category": "Books"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["fields"]["file"], "This field is required");
    }

    #[tokio::test]
    async fn test_note_year_out_of_range_is_400() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/notes",
            json!({
                "subjectCode": "CS1",
                "subjectName": "Intro",
                "year": "7",
                "category": "Books",
                "file": "https://cdn.example/x.pdf"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"]["year"], "year must be between 1 and 4, got '7'");

        let (_, notes) = send(&app, Method::GET, "/notes", json!(null)).await;
        assert!(notes.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_login_body_is_400() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"phone\": "))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["fields"]["body"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_cors_allows_only_configured_origin() {
        let app = app_for_origin("https://learnify.example");

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/notes")
            .header(header::ORIGIN, "https://learnify.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://learnify.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("GET") && methods.contains("POST"));

        let allowed = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://learnify.example")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(allowed).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://learnify.example"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );

        let foreign = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(foreign).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_bad_origin_is_config_error() {
        assert!(cors_layer("https://learnify.example").is_ok());
        assert!(matches!(
            cors_layer("bad\norigin"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
