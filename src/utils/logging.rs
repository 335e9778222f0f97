/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;

/// 记录服务启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_server_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 Learnify 后端启动 - {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("📡 监听地址: {}", config.server_addr);
    info!("🌐 允许来源: {}", config.allowed_origin);
    match &config.data_file {
        Some(path) => info!("💾 数据文件: {}", path),
        None => info!("💾 数据仅保存在内存中"),
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
