//! 笔记目录
//!
//! 按分类拉取笔记，再在本地按学年分组，每个学年一个标签页

use std::sync::Arc;
use tracing::info;

use crate::error::AppResult;
use crate::models::{Category, Note, StudyYear};
use crate::services::NotesRepository;

/// 一个学年的标签页
#[derive(Debug, Clone, PartialEq)]
pub struct YearTab {
    pub year: StudyYear,
    pub label: &'static str,
    pub notes: Vec<Note>,
    /// 没有笔记时显示的提示
    pub empty_message: Option<String>,
}

pub struct NotesCatalog {
    repo: Arc<dyn NotesRepository>,
    category: Option<Category>,
    notes: Vec<Note>,
}

impl NotesCatalog {
    pub fn new(repo: Arc<dyn NotesRepository>) -> Self {
        Self {
            repo,
            category: None,
            notes: Vec::new(),
        }
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// 拉取某个分类下的笔记，`None` 表示全部
    pub async fn load(&mut self, category: Option<Category>) -> AppResult<usize> {
        let notes = self.repo.list_notes(category).await?;
        info!(
            "📚 已加载 {} 条笔记 (分类: {})",
            notes.len(),
            category.map_or("全部", Category::label)
        );
        self.category = category;
        self.notes = notes;
        Ok(self.notes.len())
    }

    pub fn tabs(&self) -> Vec<YearTab> {
        StudyYear::ALL
            .iter()
            .map(|&year| {
                let notes: Vec<Note> = self
                    .notes
                    .iter()
                    .filter(|n| n.year == year)
                    .cloned()
                    .collect();
                let empty_message = notes
                    .is_empty()
                    .then(|| format!("No notes available for {}. Check back soon!", year.label()));
                YearTab {
                    year,
                    label: year.label(),
                    notes,
                    empty_message,
                }
            })
            .collect()
    }
}
