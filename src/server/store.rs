//! 服务端数据存储
//!
//! 所有集合放在一个读写锁后面；配置了数据文件时，每次写入后把整个存储快照为 JSON，
//! 启动时再读回来。

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{
    Answer, Category, LoginRequest, NewAnswer, NewNote, Note, Problem, SignupRequest,
};

/// 保存的用户，只存密码摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: String,
    name: String,
    phone: String,
    student_year: String,
    salt: String,
    password_digest: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    problems: Vec<Problem>,
    #[serde(default)]
    users: Vec<StoredUser>,
}

/// 内存文档存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    data_file: Option<PathBuf>,
}

impl MemoryStore {
    /// 只保存在内存中
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开数据文件，文件不存在时从空存储开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("数据文件不存在，从空存储开始: {}", path.display());
                Collections::default()
            }
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        debug!(
            "已载入 {} 条笔记、{} 个问题、{} 个用户",
            data.notes.len(),
            data.problems.len(),
            data.users.len()
        );

        Ok(Self {
            data: RwLock::new(data),
            data_file: Some(path),
        })
    }

    /// 写入快照；失败时由调用方撤销刚才的内存修改
    async fn persist(&self, data: &Collections) -> Result<(), StorageError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(data).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.display().to_string(),
                source: e,
            })
    }

    pub async fn list_notes(&self, category: Option<Category>) -> Vec<Note> {
        let data = self.data.read().await;
        data.notes
            .iter()
            .filter(|n| category.map_or(true, |c| n.category == c))
            .cloned()
            .collect()
    }

    pub async fn insert_note(&self, new: NewNote) -> Result<Note, StorageError> {
        let note = Note::from_new(new_id(), new);
        let mut data = self.data.write().await;
        data.notes.push(note.clone());
        if let Err(e) = self.persist(&data).await {
            data.notes.pop();
            return Err(e);
        }
        Ok(note)
    }

    /// 回答按写入顺序内嵌在问题里
    pub async fn list_problems(&self) -> Vec<Problem> {
        self.data.read().await.problems.clone()
    }

    pub async fn insert_problem(&self, text: &str) -> Result<Problem, StorageError> {
        let problem = Problem {
            id: new_id(),
            problem: text.to_string(),
            answers: Vec::new(),
            created_at: Some(chrono::Utc::now()),
        };
        let mut data = self.data.write().await;
        data.problems.push(problem.clone());
        if let Err(e) = self.persist(&data).await {
            data.problems.pop();
            return Err(e);
        }
        Ok(problem)
    }

    /// 问题不存在时返回 `Ok(None)`
    pub async fn insert_answer(&self, new: NewAnswer) -> Result<Option<Answer>, StorageError> {
        let mut data = self.data.write().await;
        let Some(index) = data.problems.iter().position(|p| p.id == new.problem_id) else {
            return Ok(None);
        };

        let answer = Answer {
            id: Some(new_id()),
            name: new.name,
            answer: new.answer,
            problem_id: new.problem_id,
        };
        data.problems[index].answers.push(answer.clone());
        if let Err(e) = self.persist(&data).await {
            data.problems[index].answers.pop();
            return Err(e);
        }
        Ok(Some(answer))
    }

    /// 注册新用户，手机号已存在时返回 `Ok(None)`
    pub async fn register(&self, request: SignupRequest) -> Result<Option<String>, StorageError> {
        let mut data = self.data.write().await;
        if data.users.iter().any(|u| u.phone == request.phone) {
            return Ok(None);
        }

        let salt = Uuid::new_v4().simple().to_string();
        let password_digest = digest_password(&salt, &request.password);
        data.users.push(StoredUser {
            id: new_id(),
            name: request.name,
            phone: request.phone,
            student_year: request.student_year,
            salt,
            password_digest,
        });
        if let Err(e) = self.persist(&data).await {
            data.users.pop();
            return Err(e);
        }
        Ok(Some(new_token()))
    }

    /// 校验手机号与密码，成功时签发新 token
    pub async fn authenticate(&self, request: &LoginRequest) -> Option<String> {
        let data = self.data.read().await;
        data.users
            .iter()
            .find(|u| u.phone == request.phone)
            .filter(|u| digest_password(&u.salt, &request.password) == u.password_digest)
            .map(|_| new_token())
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_token() -> String {
    Uuid::new_v4().to_string()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
