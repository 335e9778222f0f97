//! 聊天会话 - 流程层
//!
//! 一次提问拿到完整回答后，在后台任务里逐词写入当前显示内容。
//! 新的提问会中止上一次还在进行的逐词显示，两次回答不会交错。

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::services::{reveal_stream, ChatCompletion};
use crate::utils::truncate_text;

/// 当前显示的回答
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealFrame {
    /// 第几次提问，用来丢弃旧任务的写入
    pub generation: u64,
    pub text: String,
    pub done: bool,
}

/// 聊天会话
pub struct ChatSession {
    client: Arc<dyn ChatCompletion>,
    reveal_delay: Duration,
    question: String,
    loading: bool,
    error: Option<String>,
    generation: u64,
    frames: Arc<watch::Sender<RevealFrame>>,
    reveal: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// # 参数
    /// - `client`: 文本生成能力
    /// - `reveal_delay`: 相邻两个词之间的间隔
    pub fn new(client: Arc<dyn ChatCompletion>, reveal_delay: Duration) -> Self {
        let (frames, _) = watch::channel(RevealFrame::default());
        Self {
            client,
            reveal_delay,
            question: String::new(),
            loading: false,
            error: None,
            generation: 0,
            frames: Arc::new(frames),
            reveal: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// 上一次提问的错误信息（原样）
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 当前已显示的回答
    pub fn response(&self) -> String {
        self.frames.borrow().text.clone()
    }

    /// 订阅显示内容的变化
    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.frames.subscribe()
    }

    /// 提问
    ///
    /// # 返回
    /// - `Ok(true)`: 已拿到回答并开始逐词显示
    /// - `Ok(false)`: 空白问题，未发送请求
    pub async fn ask(&mut self, prompt: &str) -> AppResult<bool> {
        if prompt.trim().is_empty() {
            debug!("空白问题，忽略");
            return Ok(false);
        }

        self.cancel_reveal();
        self.generation += 1;
        let generation = self.generation;

        self.question = prompt.to_string();
        self.error = None;
        self.loading = true;
        self.frames.send_replace(RevealFrame {
            generation,
            ..Default::default()
        });

        info!("🤖 提问 #{}: {}", generation, truncate_text(prompt, 60));
        let result = self.client.complete(prompt).await;
        self.loading = false;

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => {
                warn!("✗ 提问 #{} 失败: {}", generation, e);
                self.error = Some(e.to_string());
                return Err(e.into());
            }
        };

        debug!("回答 #{} 共 {} 字符", generation, completion.text.chars().count());
        let frames = Arc::clone(&self.frames);
        let mut tokens = Box::pin(reveal_stream(&completion.text, self.reveal_delay));

        self.reveal = Some(tokio::spawn(async move {
            while let Some(token) = tokens.next().await {
                frames.send_if_modified(|frame| {
                    if frame.generation != generation {
                        return false;
                    }
                    frame.text.push_str(&token);
                    true
                });
            }
            frames.send_if_modified(|frame| {
                let current = frame.generation == generation;
                if current {
                    frame.done = true;
                }
                current
            });
        }));

        Ok(true)
    }

    /// 中止正在进行的逐词显示
    pub fn cancel_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            if !handle.is_finished() {
                debug!("中止上一次的逐词显示");
            }
            handle.abort();
        }
    }

    /// 等待逐词显示结束
    pub async fn finish_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            if let Err(e) = handle.await {
                debug!("逐词显示任务未正常结束: {}", e);
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel_reveal();
    }
}
