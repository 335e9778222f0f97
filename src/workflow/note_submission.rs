//! 笔记提交流程 - 流程层
//!
//! 核心职责：管理"上传文件 → 填写表单 → 创建笔记"这一组状态
//!
//! 两个阶段各自有一个进行中标记：
//! 1. 选中文件后立即上传，结果写回表单的 file 字段
//! 2. 提交时把整张表单发给后端
//!
//! 上传进行中时拒绝提交；重新选择文件会作废之前的上传，
//! 作废的上传即使稍后返回也不会写入表单。

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{
    AppError, AppResult, SubmissionError, UploadError, ValidationError, WorkflowError,
};
use crate::models::{NewNote, Note, NoteField, NoteForm};
use crate::services::{BlobStore, FileUpload, NotesRepository};
use crate::utils::truncate_text;
use crate::workflow::Notification;

/// 一次上传的编号，用于识别过期的上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket(u64);

/// 笔记表单状态机
///
/// 不做任何网络请求，只根据事件更新状态
#[derive(Debug, Default)]
pub struct NoteSubmission {
    form: NoteForm,
    errors: ValidationError,
    uploaded_file_name: Option<String>,
    /// 正在进行的上传（编号 + 文件名）
    pending_upload: Option<(UploadTicket, String)>,
    submitting: bool,
    next_ticket: u64,
    notification: Option<Notification>,
}

impl NoteSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&self) -> &NoteForm {
        &self.form
    }

    pub fn errors(&self) -> &ValidationError {
        &self.errors
    }

    pub fn uploaded_file_name(&self) -> Option<&str> {
        self.uploaded_file_name.as_deref()
    }

    pub fn is_uploading(&self) -> bool {
        self.pending_upload.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// 两个阶段都空闲时才能提交
    pub fn can_submit(&self) -> bool {
        !self.is_uploading() && !self.submitting
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    /// 取走当前提示（弹窗显示一次即消失）
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    /// 修改一个文本字段，同时清除该字段的错误
    ///
    /// file 字段只能通过上传写入
    pub fn set_field(&mut self, field: NoteField, value: impl Into<String>) {
        if field == NoteField::File {
            warn!("file 字段只能由上传结果写入，忽略手动修改");
            return;
        }
        self.form.set(field, value);
        self.errors.fields.remove(field.name());
    }

    /// 选中新文件，返回本次上传的编号
    ///
    /// 之前的上传（无论是否完成）都被作废，file 字段清空直到新上传成功
    pub fn begin_upload(&mut self, file_name: impl Into<String>) -> UploadTicket {
        self.next_ticket += 1;
        let ticket = UploadTicket(self.next_ticket);

        if let Some((old, name)) = self.pending_upload.take() {
            debug!("上传 #{} ({}) 被新的选择替代", old.0, name);
        }

        self.form.file.clear();
        self.uploaded_file_name = None;
        self.pending_upload = Some((ticket, file_name.into()));
        ticket
    }

    /// 记录上传结果
    ///
    /// # 返回
    /// - `Ok(Some(url))`: 上传成功并已写入表单
    /// - `Ok(None)`: 结果已过期，被忽略
    /// - `Err(..)`: 上传失败，file 字段保持为空
    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        result: Result<String, UploadError>,
    ) -> AppResult<Option<String>> {
        let file_name = match self.pending_upload.take() {
            Some((current, name)) if current == ticket => name,
            other => {
                debug!("忽略过期的上传结果 #{}", ticket.0);
                self.pending_upload = other;
                return Ok(None);
            }
        };

        match result {
            Ok(url) => {
                info!("✓ 文件上传成功: {} -> {}", file_name, url);
                self.form.file = url.clone();
                self.uploaded_file_name = Some(file_name);
                self.errors.fields.remove(NoteField::File.name());
                Ok(Some(url))
            }
            Err(e) => {
                error!("✗ 文件上传失败: {} ({})", file_name, e);
                self.notification = Some(Notification::error(
                    "Upload Failed",
                    "Could not upload file.",
                ));
                Err(e.into())
            }
        }
    }

    /// 开始提交：检查状态与表单，通过后返回请求体
    pub fn begin_submit(&mut self) -> AppResult<NewNote> {
        if self.is_uploading() {
            return Err(WorkflowError::UploadInFlight.into());
        }
        if self.submitting {
            return Err(WorkflowError::SubmitInFlight.into());
        }

        match self.form.to_new_note() {
            Ok(note) => {
                self.errors = ValidationError::new();
                self.submitting = true;
                Ok(note)
            }
            Err(errors) => {
                warn!("表单校验未通过: {}", errors);
                self.errors = errors.clone();
                Err(errors.into())
            }
        }
    }

    /// 记录后端创建结果
    ///
    /// 成功时清空整张表单；失败时保留已填写的内容方便重试
    pub fn complete_submit(&mut self, result: Result<Note, SubmissionError>) -> AppResult<Note> {
        self.submitting = false;

        match result {
            Ok(note) => {
                info!("✓ 笔记已创建: {} ({})", note.subject_code, note.id);
                self.form = NoteForm::default();
                self.errors = ValidationError::new();
                self.uploaded_file_name = None;
                self.notification = Some(Notification::success("Success", "Notes uploaded!"));
                Ok(note)
            }
            Err(e) => {
                error!("✗ 笔记创建失败: {}", e);
                self.notification = Some(Notification::error("Error", "Failed to submit notes."));
                Err(e.into())
            }
        }
    }
}

/// 笔记提交流程
///
/// - 持有状态机与两个能力（文件存储、笔记集合）
/// - 每个事件顺序 await，不并发
pub struct NoteSubmissionFlow {
    state: NoteSubmission,
    blob_store: Arc<dyn BlobStore>,
    notes: Arc<dyn NotesRepository>,
}

impl NoteSubmissionFlow {
    pub fn new(blob_store: Arc<dyn BlobStore>, notes: Arc<dyn NotesRepository>) -> Self {
        Self {
            state: NoteSubmission::new(),
            blob_store,
            notes,
        }
    }

    pub fn state(&self) -> &NoteSubmission {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut NoteSubmission {
        &mut self.state
    }

    pub fn set_field(&mut self, field: NoteField, value: impl Into<String>) {
        self.state.set_field(field, value);
    }

    /// 选中文件后立即上传
    pub async fn select_file(&mut self, file: FileUpload) -> AppResult<Option<String>> {
        info!("📤 开始上传文件: {} ({} 字节)", file.file_name, file.bytes.len());
        let ticket = self.state.begin_upload(file.file_name.clone());
        let result = self.blob_store.upload(file).await;
        self.state.complete_upload(ticket, result)
    }

    /// 提交当前表单
    pub async fn submit_form(&mut self) -> AppResult<Note> {
        let new_note = self.state.begin_submit()?;
        debug!(
            "提交笔记: {} / {}",
            new_note.subject_code,
            truncate_text(&new_note.subject_name, 40)
        );
        let result = self.notes.create_note(new_note).await;
        self.state.complete_submit(result)
    }

    /// 一次性提交：校验 → 上传 → 创建
    ///
    /// 文本字段和文件是否存在都在发出任何请求之前检查
    ///
    /// # 参数
    /// - `fields`: 表单内容（file 字段会被忽略）
    /// - `file`: 要上传的文件
    ///
    /// # 返回
    /// 返回后端创建的笔记
    pub async fn submit(&mut self, fields: NoteForm, file: Option<FileUpload>) -> AppResult<Note> {
        let mut errors = fields.validate_fields();
        fields.parse_choices(&mut errors);
        if file.is_none() {
            errors.require(NoteField::File.name(), "");
        }

        if !errors.is_empty() {
            warn!("表单校验未通过，不发送请求: {}", errors);
            self.state.errors = errors.clone();
            return Err(AppError::Validation(errors));
        }

        for field in NoteField::ALL {
            if field != NoteField::File {
                self.state.set_field(field, fields.get(field));
            }
        }

        if let Some(file) = file {
            if self.select_file(file).await?.is_none() {
                // 顺序 await 时不会出现过期结果
                return Err(UploadError::MissingUrl.into());
            }
        }

        self.submit_form().await
    }
}
