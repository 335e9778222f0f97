use tracing_subscriber::EnvFilter;

/// 初始化日志，`RUST_LOG` 未设置时默认输出本 crate 的 info 级别
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("learnify=info"));

    // 测试里可能被调用多次
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
