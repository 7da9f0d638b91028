//! 日志初始化
//!
//! 基于 tracing-subscriber 的进程级日志安装，幂等。

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 使用默认过滤器初始化日志
pub fn init() {
    init_with_filter("modelcast=info");
}

/// 使用指定过滤器初始化日志
///
/// 环境变量 `RUST_LOG` 存在时优先生效。重复调用是安全的空操作。
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
