//! 文件存储能力 - 业务能力层
//!
//! 只负责"把一个文件变成可访问的地址"，不关心表单状态

use async_trait::async_trait;
use std::path::Path;

use crate::error::UploadError;

/// 用户选中的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// 从本地路径读取文件
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self { file_name, bytes })
    }
}

/// 文件存储
///
/// 上传失败不重试，由调用方决定是否让用户重新选择文件
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 上传文件，成功时返回存储服务给出的 secure_url
    async fn upload(&self, file: FileUpload) -> Result<String, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbms-unit1.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.4")
            .unwrap();

        let upload = FileUpload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "dbms-unit1.pdf");
        assert_eq!(upload.bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_from_missing_path_is_read_error() {
        let err = FileUpload::from_path(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ReadFailed { .. }));
    }
}
