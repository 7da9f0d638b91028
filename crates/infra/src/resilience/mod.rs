//! 弹性模块
//!
//! ## 模块结构
//!
//! - `retry` - 重试配置与指数退避
//! - `rate_limit` - 每 Provider 的令牌桶限流
//! - `deadline` - 截止时间计算

mod deadline;
mod rate_limit;
mod retry;

pub use deadline::Deadline;
pub use rate_limit::{
    AdmissionMode, BucketConfig, Permit, ProviderRateLimiter, RateLimitError,
};
pub use retry::{Retrier, RetryConfig};
