//! 逐词显示
//!
//! 回答已经完整拿到，这里只是按固定间隔把它一段段吐出来

use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// 按空格切分，每段后面补一个空格
///
/// 只按空格切分，代码块里的换行和缩进留在片段内部
pub fn reveal_tokens(text: &str) -> Vec<String> {
    text.split(' ').map(|word| format!("{} ", word)).collect()
}

/// 第 i 段在开始后 `delay × i` 时刻产出，顺序与原文一致
pub fn reveal_stream(text: &str, delay: Duration) -> impl Stream<Item = String> {
    let start = Instant::now();
    stream::iter(reveal_tokens(text).into_iter().enumerate()).then(
        move |(index, token)| async move {
            let offset = delay * u32::try_from(index).unwrap_or(u32::MAX);
            tokio::time::sleep_until(start + offset).await;
            token
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_keep_trailing_space() {
        assert_eq!(reveal_tokens("a b c"), vec!["a ", "b ", "c "]);
        assert_eq!(reveal_tokens("a b c").concat(), "a b c ");
    }

    #[test]
    fn test_tokens_keep_newlines_inside() {
        assert_eq!(reveal_tokens("x\ny z"), vec!["x\ny ", "z "]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_is_paced_by_index() {
        let start = Instant::now();
        let mut stream = Box::pin(reveal_stream("a b c", Duration::from_millis(75)));

        let mut seen = Vec::new();
        while let Some(token) = stream.next().await {
            seen.push((token, start.elapsed().as_millis()));
        }

        assert_eq!(
            seen,
            vec![
                ("a ".to_string(), 0),
                ("b ".to_string(), 75),
                ("c ".to_string(), 150)
            ]
        );
    }
}
