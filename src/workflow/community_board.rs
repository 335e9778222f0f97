//! 社区问答看板 - 流程层
//!
//! 问题连同回答每次整体拉取，"分页"只是客户端的显示上限：
//! 默认显示 3 条回答，每点一次"显示更多"再多 3 条。
//! 显示上限与回答面板都按问题 id 记录，重新加载后依然对得上。

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppResult, ValidationError};
use crate::models::{Answer, NewAnswer, NewProblem, Problem};
use crate::services::CommunityRepository;
use crate::utils::truncate_text;

/// 默认显示的回答数，也是每次"显示更多"增加的数量
pub const ANSWER_PAGE_SIZE: usize = 3;

pub const EMPTY_PROBLEMS_MESSAGE: &str = "No problems found. Be the first to share one!";

/// 看板渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
    Empty { message: String },
    Problems(Vec<ProblemCard>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemCard {
    pub id: String,
    pub problem: String,
    pub answers: Vec<AnswerLine>,
    pub hidden_answers: usize,
    pub can_show_more: bool,
    pub panel_open: bool,
    pub panel_button: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLine {
    /// "Ans 1"、"Ans 2" ...
    pub label: String,
    pub answer: String,
    pub name: String,
}

/// 看板状态
#[derive(Debug, Default)]
pub struct CommunityBoard {
    problems: Vec<Problem>,
    /// 问题 id → "显示更多"点击次数
    reveal_clicks: HashMap<String, usize>,
    open_panel: Option<String>,
    /// 每次提交后加一，和已加载的版本不同时需要重新拉取
    change: u64,
    loaded_change: Option<u64>,
    filter: Option<String>,
    loading: bool,
    last_error: Option<String>,
}

impl CommunityBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    fn find(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == problem_id)
    }

    /// 当前显示的回答数：min(3 + 3k, n)
    pub fn answer_count(&self, problem_id: &str) -> usize {
        let total = self.find(problem_id).map_or(0, |p| p.answers.len());
        let clicks = self.reveal_clicks.get(problem_id).copied().unwrap_or(0);
        (ANSWER_PAGE_SIZE + ANSWER_PAGE_SIZE * clicks).min(total)
    }

    pub fn can_show_more(&self, problem_id: &str) -> bool {
        self.find(problem_id)
            .is_some_and(|p| self.answer_count(problem_id) < p.answers.len())
    }

    /// 多显示 3 条回答；没有隐藏的回答时不做任何事
    pub fn show_more(&mut self, problem_id: &str) -> bool {
        if !self.can_show_more(problem_id) {
            return false;
        }
        *self.reveal_clicks.entry(problem_id.to_string()).or_insert(0) += 1;
        true
    }

    pub fn is_panel_open(&self, problem_id: &str) -> bool {
        self.open_panel.as_deref() == Some(problem_id)
    }

    pub fn open_panel(&self) -> Option<&str> {
        self.open_panel.as_deref()
    }

    /// 切换回答面板，同一时间最多打开一个
    pub fn toggle_answer_panel(&mut self, problem_id: &str) {
        if self.is_panel_open(problem_id) {
            self.open_panel = None;
        } else {
            self.open_panel = Some(problem_id.to_string());
        }
    }

    pub fn close_panel(&mut self) {
        self.open_panel = None;
    }

    /// 标记数据已变化，下次刷新时重新拉取
    pub fn mark_changed(&mut self) {
        self.change += 1;
    }

    pub fn needs_reload(&self) -> bool {
        self.loaded_change != Some(self.change)
    }

    pub fn set_filter(&mut self, filter: Option<&str>) {
        self.filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
    }

    fn begin_load(&mut self) {
        self.loading = true;
    }

    /// 写入新拉取的问题列表
    ///
    /// 已消失的问题对应的面板与点击次数一并清理
    pub fn apply_problems(&mut self, problems: Vec<Problem>) {
        let problems: Vec<Problem> = match &self.filter {
            Some(needle) => problems
                .into_iter()
                .filter(|p| p.problem.to_lowercase().contains(needle.as_str()))
                .collect(),
            None => problems,
        };

        self.reveal_clicks
            .retain(|id, _| problems.iter().any(|p| &p.id == id));
        if let Some(open) = &self.open_panel {
            if !problems.iter().any(|p| &p.id == open) {
                debug!("问题 {} 已不在列表中，关闭回答面板", open);
                self.open_panel = None;
            }
        }

        self.problems = problems;
        self.loaded_change = Some(self.change);
        self.loading = false;
        self.last_error = None;
    }

    /// 拉取失败：保留之前的列表
    pub fn load_failed(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.last_error = Some(message.into());
    }

    pub fn render(&self) -> BoardView {
        if self.problems.is_empty() {
            return BoardView::Empty {
                message: EMPTY_PROBLEMS_MESSAGE.to_string(),
            };
        }

        let cards = self
            .problems
            .iter()
            .map(|p| {
                let shown = self.answer_count(&p.id);
                let panel_open = self.is_panel_open(&p.id);
                ProblemCard {
                    id: p.id.clone(),
                    problem: p.problem.clone(),
                    answers: p
                        .answers
                        .iter()
                        .take(shown)
                        .enumerate()
                        .map(|(i, a)| AnswerLine {
                            label: format!("Ans {}", i + 1),
                            answer: a.answer.clone(),
                            name: a.name.clone(),
                        })
                        .collect(),
                    hidden_answers: p.answers.len() - shown,
                    can_show_more: shown < p.answers.len(),
                    panel_open,
                    panel_button: if panel_open { "Cancel" } else { "Add Your Answer" },
                }
            })
            .collect();

        BoardView::Problems(cards)
    }
}

/// 社区问答流程
pub struct CommunityFlow {
    board: CommunityBoard,
    repo: Arc<dyn CommunityRepository>,
}

impl CommunityFlow {
    pub fn new(repo: Arc<dyn CommunityRepository>) -> Self {
        Self {
            board: CommunityBoard::new(),
            repo,
        }
    }

    pub fn board(&self) -> &CommunityBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut CommunityBoard {
        &mut self.board
    }

    /// 拉取全部问题（含回答），按可选关键字在本地过滤
    ///
    /// # 返回
    /// 返回过滤后的问题列表
    pub async fn load(&mut self, filter: Option<&str>) -> AppResult<Vec<Problem>> {
        self.board.set_filter(filter);
        self.reload().await?;
        Ok(self.board.problems().to_vec())
    }

    /// 数据变化过才重新拉取
    pub async fn refresh_if_changed(&mut self) -> AppResult<bool> {
        if !self.board.needs_reload() {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    async fn reload(&mut self) -> AppResult<()> {
        self.board.begin_load();
        match self.repo.list_problems().await {
            Ok(problems) => {
                info!("📥 已加载 {} 个问题", problems.len());
                self.board.apply_problems(problems);
                Ok(())
            }
            Err(e) => {
                warn!("加载问题失败，保留当前列表: {}", e);
                self.board.load_failed(e.to_string());
                Err(e.into())
            }
        }
    }

    /// 发布新问题，成功后整体刷新
    pub async fn submit_problem(&mut self, text: &str) -> AppResult<Problem> {
        let mut errors = ValidationError::new();
        errors.require("problem", text);
        errors.into_result()?;

        info!("❓ 发布问题: {}", truncate_text(text.trim(), 60));
        let created = self
            .repo
            .create_problem(NewProblem {
                problem: text.trim().to_string(),
            })
            .await?;

        self.after_write().await;
        Ok(created)
    }

    /// 回答问题：成功后关闭面板并整体刷新
    pub async fn submit_answer(
        &mut self,
        problem_id: &str,
        name: &str,
        text: &str,
    ) -> AppResult<Answer> {
        let mut errors = ValidationError::new();
        errors.require("problemId", problem_id);
        errors.require("name", name);
        errors.require("answer", text);
        errors.into_result()?;

        info!("💬 回答问题 {}: {}", problem_id, truncate_text(text.trim(), 60));
        let created = self
            .repo
            .create_answer(NewAnswer {
                problem_id: problem_id.to_string(),
                name: name.trim().to_string(),
                answer: text.trim().to_string(),
            })
            .await?;

        self.board.close_panel();
        self.after_write().await;
        Ok(created)
    }

    // 写入已成功，刷新失败只记录在看板上
    async fn after_write(&mut self) {
        self.board.mark_changed();
        if let Err(e) = self.refresh_if_changed().await {
            warn!("提交成功但刷新失败: {}", e);
        }
    }
}
