//! 登录 / 注册流程
//!
//! 先在本地校验表单，通过后请求后端，拿到 token 就写入会话文件

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppResult, AuthError};
use crate::models::{AuthResponse, LoginRequest, SignupRequest};
use crate::services::{AuthApi, SessionStore};

pub struct AuthFlow {
    api: Arc<dyn AuthApi>,
    session: SessionStore,
}

impl AuthFlow {
    pub fn new(api: Arc<dyn AuthApi>, session: SessionStore) -> Self {
        Self { api, session }
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        request.validate().into_result()?;
        info!("🔑 登录: {}", request.phone);
        let response = self.api.login(request).await?;
        self.keep_token(&response).await?;
        Ok(response)
    }

    pub async fn signup(&self, request: SignupRequest) -> AppResult<AuthResponse> {
        request.validate().into_result()?;
        info!("📝 注册: {} ({})", request.name, request.phone);
        let response = self.api.signup(request).await?;
        self.keep_token(&response).await?;
        Ok(response)
    }

    /// 退出登录，删除会话文件
    pub async fn logout(&self) -> AppResult<()> {
        self.session.clear().await?;
        info!("已退出登录");
        Ok(())
    }

    pub async fn current_token(&self) -> AppResult<Option<String>> {
        Ok(self.session.load().await?)
    }

    async fn keep_token(&self, response: &AuthResponse) -> Result<(), AuthError> {
        match response.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => self.session.save(token).await,
            None => {
                warn!("后端响应中没有 token: {}", response.message);
                Err(AuthError::MissingToken)
            }
        }
    }
}
