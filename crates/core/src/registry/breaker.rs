//! Provider 熔断器
//!
//! 每个 Provider 一个三态熔断状态机：CLOSED → OPEN → HALF_OPEN。
//! 滚动窗口内连续失败达到阈值后打开，冷却期结束后放行一次试探调用。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 熔断器配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// 连续失败阈值，窗口内达到后熔断
    pub failure_threshold: u32,
    /// 失败统计的滚动窗口（毫秒）
    pub window_ms: u64,
    /// 熔断后的冷却时长（毫秒）
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 60_000,
            cooldown_ms: 30_000,
        }
    }
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, window_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            failure_threshold,
            window_ms,
            cooldown_ms,
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            failure_threshold: self.failure_threshold.max(1),
            window_ms: self.window_ms.max(1),
            cooldown_ms: self.cooldown_ms,
        }
    }
}

/// 熔断状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 正常放行
    Closed,
    /// 熔断中，候选列表排除该 Provider
    Open,
    /// 冷却结束，允许一次试探调用
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

/// 熔断器状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    /// 窗口内的失败次数
    pub recent_failures: usize,
    /// 距熔断发生的毫秒数（未熔断时为空）
    pub opened_ms_ago: Option<u64>,
}

/// 单个 Provider 的熔断器
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    /// HALF_OPEN 状态下试探调用是否已被占用
    probe_inflight: bool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config: config.normalized(),
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            probe_inflight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// 当前是否对外放行
    ///
    /// OPEN 状态下冷却期结束会转入 HALF_OPEN；HALF_OPEN 状态下只有
    /// 试探名额未被占用时才放行。
    pub fn allows_traffic(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.cooldown_elapsed() {
                    self.state = CircuitState::HalfOpen;
                    self.probe_inflight = false;
                    tracing::info!("[Breaker] open -> half_open，冷却期结束");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => !self.probe_inflight,
        }
    }

    /// 在发起调用前占用名额
    ///
    /// CLOSED 状态总是放行；HALF_OPEN 状态占用唯一的试探名额。
    pub fn try_acquire(&mut self) -> bool {
        if !self.allows_traffic() {
            return false;
        }
        if self.state == CircuitState::HalfOpen {
            self.probe_inflight = true;
        }
        true
    }

    /// 归还未产生结果的试探名额（调用被取消）
    pub fn release_probe(&mut self) {
        self.probe_inflight = false;
    }

    /// 记录一次成功
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Closed;
                self.failures.clear();
                self.opened_at = None;
                self.probe_inflight = false;
                tracing::info!("[Breaker] half_open -> closed，试探成功");
            }
            CircuitState::Closed => {
                // 成功打断连续失败
                self.failures.clear();
            }
            CircuitState::Open => {}
        }
    }

    /// 记录一次失败
    pub fn record_failure(&mut self) {
        let now = Instant::now();
        match self.state {
            CircuitState::HalfOpen => {
                self.trip(now);
                tracing::warn!("[Breaker] half_open -> open，试探失败");
            }
            CircuitState::Closed => {
                self.failures.push_back(now);
                self.prune(now);
                if self.failures.len() >= self.config.failure_threshold as usize {
                    self.trip(now);
                    tracing::warn!(
                        "[Breaker] closed -> open，窗口内失败 {} 次",
                        self.failures.len()
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            recent_failures: self.failures.len(),
            opened_ms_ago: self.opened_at.map(|at| at.elapsed().as_millis() as u64),
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_inflight = false;
    }

    fn prune(&mut self, now: Instant) {
        let window = Duration::from_millis(self.config.window_ms);
        while let Some(front) = self.failures.front() {
            if now.duration_since(*front) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        match self.opened_at {
            Some(at) => at.elapsed() >= Duration::from_millis(self.config.cooldown_ms),
            None => true,
        }
    }
}
