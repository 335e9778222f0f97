//! 文本生成能力 - 业务能力层

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::Completion;

/// 单次问答
///
/// 整个回答一次性返回，不是流式协议
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, ApiError>;
}

/// 把模型输出里字面的 `\n`、`\t` 还原成真正的换行和制表符
pub fn unescape_text(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\t", "\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_text() {
        assert_eq!(
            unescape_text(r"fn main() {\n\tprintln!();\n}"),
            "fn main() {\n\tprintln!();\n}"
        );
        // 真正的换行保持不变
        assert_eq!(unescape_text("a\nb"), "a\nb");
    }
}
