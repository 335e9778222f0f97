//! 后端集合的 CRUD 能力
//!
//! 每个 trait 对应后端的一组路由，实现方可以是 HTTP 客户端，也可以是测试里的内存实现

use async_trait::async_trait;

use crate::error::{AuthError, SubmissionError};
use crate::models::{
    Answer, AuthResponse, Category, LoginRequest, NewAnswer, NewNote, NewProblem, Note, Problem,
    SignupRequest,
};

/// 笔记集合
#[async_trait]
pub trait NotesRepository: Send + Sync {
    /// POST /notes
    async fn create_note(&self, note: NewNote) -> Result<Note, SubmissionError>;

    /// GET /notes?category=，不传分类时返回全部
    async fn list_notes(&self, category: Option<Category>) -> Result<Vec<Note>, SubmissionError>;
}

/// 问题与回答集合
#[async_trait]
pub trait CommunityRepository: Send + Sync {
    /// GET /problems，回答内嵌在问题里
    async fn list_problems(&self) -> Result<Vec<Problem>, SubmissionError>;

    /// POST /problems
    async fn create_problem(&self, problem: NewProblem) -> Result<Problem, SubmissionError>;

    /// POST /answers
    async fn create_answer(&self, answer: NewAnswer) -> Result<Answer, SubmissionError>;
}

/// 登录与注册
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError>;

    async fn signup(&self, request: SignupRequest) -> Result<AuthResponse, AuthError>;
}
