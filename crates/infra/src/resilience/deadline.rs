//! 截止时间计算
//!
//! 任务级截止时间与单次调用超时的夹取。

use std::time::{Duration, Instant};

/// 截止时间
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// 从现在起 duration 后到期
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    /// 从现在起 ms 毫秒后到期
    pub fn after_ms(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    /// 剩余时长（已过期时为零）
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// 是否已过期
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// 把超时夹取到剩余截止时间内
    pub fn clamp(&self, timeout: Duration) -> Duration {
        timeout.min(self.remaining())
    }
}
