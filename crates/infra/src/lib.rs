//! modelcast 基础设施模块
//!
//! 提供重试、限流、截止时间等弹性能力。

pub mod resilience;

pub use resilience::{
    AdmissionMode, BucketConfig, Deadline, Permit, ProviderRateLimiter, RateLimitError, Retrier,
    RetryConfig,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
