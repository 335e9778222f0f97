//! # Learnify
//!
//! 学生学习资料分享平台：笔记上传与浏览、社区问答、AI 问答、登录注册
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 与外部 HTTP 服务通信
//! - `BackendClient` - Learnify 后端（笔记 / 社区 / 认证 / 上传与问答代理）
//! - `CloudinaryClient` - 对象存储直传
//! - `GeminiClient` - 文本生成 API
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，以 trait 表示
//! - `BlobStore` / `NotesRepository` / `CommunityRepository` / `AuthApi` / `ChatCompletion`
//! - `SessionStore` - 保存登录令牌
//! - `reveal` - 逐词显示
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 一个页面就是一个显式的状态对象
//! - `NoteSubmissionFlow` - 上传文件 → 校验 → 创建笔记
//! - `CommunityFlow` - 问题列表、显示更多、回答面板
//! - `ChatSession` - 提问与可取消的逐词显示
//! - `AuthFlow` / `NotesCatalog`
//!
//! ### ④ 服务端（Server）
//! - `server/` - axum 路由、内存存储、跨域策略

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{BackendClient, CloudinaryClient, GeminiClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Category, Note, NoteForm, Problem, StudyYear};
pub use workflow::{AuthFlow, ChatSession, CommunityFlow, NoteSubmissionFlow, NotesCatalog};
