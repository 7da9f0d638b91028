//! 每 Provider 的令牌桶限流
//!
//! 固定窗口补满：每个窗口开始时令牌补满到容量，窗口内每次放行消耗
//! 一枚令牌。取消的调用可以把令牌退回桶里。

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// 限流错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// 窗口配额已用尽（Reject 模式）
    #[error("Provider {provider_id} 限流：窗口配额已用尽")]
    Exhausted { provider_id: String },

    /// 等待放行超出了允许的等待时长
    #[error("Provider {provider_id} 限流：等待放行超时")]
    WaitTimeout { provider_id: String },
}

/// 准入模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AdmissionMode {
    /// 配额用尽时立即拒绝
    Reject,
    /// 配额用尽时等待下个窗口，最长等待 max_wait_ms
    Wait { max_wait_ms: u64 },
}

impl Default for AdmissionMode {
    fn default() -> Self {
        AdmissionMode::Wait { max_wait_ms: 5_000 }
    }
}

/// 令牌桶配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketConfig {
    /// 每个窗口允许的最大请求数
    pub max_requests: u32,
    /// 窗口时长（毫秒）
    pub window_ms: u64,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

/// 单个 Provider 的令牌桶
#[derive(Debug)]
struct Bucket {
    config: BucketConfig,
    tokens: u32,
    window_start: Instant,
}

impl Bucket {
    fn new(config: BucketConfig) -> Self {
        Self {
            config,
            tokens: config.max_requests,
            window_start: Instant::now(),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.config.window_ms.max(1))
    }

    fn refill_if_due(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window() {
            self.tokens = self.config.max_requests;
            self.window_start = now;
        }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill_if_due(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn put_back(&mut self) {
        self.tokens = (self.tokens + 1).min(self.config.max_requests);
    }

    fn next_window_in(&self, now: Instant) -> Duration {
        (self.window_start + self.window()).saturating_duration_since(now)
    }
}

struct Inner {
    buckets: DashMap<String, Bucket>,
    mode: AdmissionMode,
    default_config: BucketConfig,
}

/// 每 Provider 的限流器
///
/// Clone 共享同一份桶状态。
#[derive(Clone)]
pub struct ProviderRateLimiter {
    inner: Arc<Inner>,
}

impl ProviderRateLimiter {
    pub fn new(mode: AdmissionMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: DashMap::new(),
                mode,
                default_config: BucketConfig::default(),
            }),
        }
    }

    /// 为 Provider 安装配额（重复安装会重置窗口）
    pub fn set_quota(&self, provider_id: &str, config: BucketConfig) {
        self.inner
            .buckets
            .insert(provider_id.to_string(), Bucket::new(config));
    }

    /// 申请放行
    ///
    /// `wait_cap` 进一步收紧 Wait 模式允许的等待时长（例如任务剩余的
    /// 截止时间）。拿到的 [`Permit`] 在调用被取消时可以退回令牌。
    pub async fn acquire(
        &self,
        provider_id: &str,
        wait_cap: Option<Duration>,
    ) -> Result<Permit, RateLimitError> {
        let max_wait = match self.inner.mode {
            AdmissionMode::Reject => Duration::ZERO,
            AdmissionMode::Wait { max_wait_ms } => {
                let configured = Duration::from_millis(max_wait_ms);
                match wait_cap {
                    Some(cap) => configured.min(cap),
                    None => configured,
                }
            }
        };

        let started = Instant::now();
        loop {
            let wait_hint = {
                let mut bucket = self
                    .inner
                    .buckets
                    .entry(provider_id.to_string())
                    .or_insert_with(|| Bucket::new(self.inner.default_config));
                let now = Instant::now();
                if bucket.try_take(now) {
                    return Ok(Permit {
                        inner: self.inner.clone(),
                        provider_id: provider_id.to_string(),
                        refunded: false,
                    });
                }
                bucket.next_window_in(now)
            };

            if matches!(self.inner.mode, AdmissionMode::Reject) {
                return Err(RateLimitError::Exhausted {
                    provider_id: provider_id.to_string(),
                });
            }

            let elapsed = started.elapsed();
            if elapsed + wait_hint > max_wait {
                tracing::warn!(
                    "[RateLimit] provider={} 等待放行超时 (已等待 {:?})",
                    provider_id,
                    elapsed
                );
                return Err(RateLimitError::WaitTimeout {
                    provider_id: provider_id.to_string(),
                });
            }

            tokio::time::sleep(wait_hint.max(Duration::from_millis(1))).await;
        }
    }

    /// 当前剩余令牌数（仅用于观测与测试）
    pub fn available_tokens(&self, provider_id: &str) -> Option<u32> {
        self.inner.buckets.get_mut(provider_id).map(|mut bucket| {
            let now = Instant::now();
            bucket.refill_if_due(now);
            bucket.tokens
        })
    }
}

impl Default for ProviderRateLimiter {
    fn default() -> Self {
        Self::new(AdmissionMode::default())
    }
}

/// 放行凭证
///
/// 正常完成的调用令牌保持消耗；取消时调用 [`Permit::refund`] 退回。
pub struct Permit {
    inner: Arc<Inner>,
    provider_id: String,
    refunded: bool,
}

impl Permit {
    /// 把令牌退回桶里（调用被取消、未真正消耗配额时）
    pub fn refund(mut self) {
        if !self.refunded {
            if let Some(mut bucket) = self.inner.buckets.get_mut(&self.provider_id) {
                bucket.put_back();
            }
            self.refunded = true;
            tracing::debug!("[RateLimit] provider={} 令牌已退回", self.provider_id);
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}
