//! 重试配置与指数退避
//!
//! 退避延迟 = base * 2^attempt，封顶 max，并叠加 ±25% 抖动。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 最大重试次数
    pub max_retries: u32,
    /// 基础退避延迟（毫秒）
    pub base_delay_ms: u64,
    /// 退避延迟上限（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: base_delay_ms.max(1),
            max_delay_ms: max_delay_ms.max(base_delay_ms.max(1)),
        }
    }

    /// 状态码是否可重试（408/429/5xx）
    pub fn is_retryable(&self, status_code: u16) -> bool {
        matches!(status_code, 408 | 429) || (500..=599).contains(&status_code)
    }
}

/// 重试器
pub struct Retrier {
    config: RetryConfig,
}

impl Retrier {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// 计算第 attempt 次失败后的退避延迟（带抖动）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16));
        let capped = exp.min(self.config.max_delay_ms) as f64;
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((capped * jitter) as u64)
    }
}

impl Default for Retrier {
    fn default() -> Self {
        Self::with_defaults()
    }
}
