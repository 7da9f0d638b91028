//! 编排配置
//!
//! 汇总调用方可配置的全部选项：策略、链长、超时、熔断阈值、限流
//! 准入、锦标赛并发与评分器。

use modelcast_core::registry::BreakerConfig;
use modelcast_core::routing::{BalancedWeights, StrategyKind};
use modelcast_infra::{AdmissionMode, RetryConfig};
use serde::{Deserialize, Serialize};

/// 编排器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 默认策略
    pub default_strategy: StrategyKind,
    /// 降级链最大长度
    pub max_chain_length: usize,
    /// 单候选调用超时（毫秒），会被任务剩余截止时间进一步夹取
    pub candidate_timeout_ms: u64,
    /// 任务总截止时长上限（毫秒），任务自带的截止时长不得超过它
    pub task_deadline_ms: u64,
    /// 熔断器配置
    pub breaker: BreakerConfig,
    /// 限流准入模式
    pub admission: AdmissionMode,
    /// 退避重试配置
    pub retry: RetryConfig,
    /// 锦标赛并发上限
    pub tournament_concurrency: usize,
    /// 默认评分器 ID
    pub scorer_id: String,
    /// 均衡策略权重
    pub balanced_weights: BalancedWeights,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::Balanced,
            max_chain_length: 5,
            candidate_timeout_ms: 30_000,
            task_deadline_ms: 300_000,
            breaker: BreakerConfig::default(),
            admission: AdmissionMode::default(),
            retry: RetryConfig::default(),
            tournament_concurrency: 3,
            scorer_id: "heuristic".to_string(),
            balanced_weights: BalancedWeights::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_default_strategy(mut self, strategy: StrategyKind) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_max_chain_length(mut self, max: usize) -> Self {
        self.max_chain_length = max.max(1);
        self
    }

    pub fn with_candidate_timeout_ms(mut self, ms: u64) -> Self {
        self.candidate_timeout_ms = ms.max(1);
        self
    }

    pub fn with_task_deadline_ms(mut self, ms: u64) -> Self {
        self.task_deadline_ms = ms.max(1);
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_admission(mut self, admission: AdmissionMode) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tournament_concurrency(mut self, limit: usize) -> Self {
        self.tournament_concurrency = limit.max(1);
        self
    }

    pub fn with_scorer(mut self, scorer_id: &str) -> Self {
        self.scorer_id = scorer_id.to_string();
        self
    }

    pub fn with_balanced_weights(mut self, weights: BalancedWeights) -> Self {
        self.balanced_weights = weights.normalized();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.default_strategy, StrategyKind::Balanced);
        assert_eq!(config.max_chain_length, 5);
        assert_eq!(config.scorer_id, "heuristic");
    }

    #[test]
    fn test_builders_normalize() {
        let config = OrchestratorConfig::default()
            .with_max_chain_length(0)
            .with_tournament_concurrency(0);
        assert_eq!(config.max_chain_length, 1);
        assert_eq!(config.tournament_concurrency, 1);
    }

    #[test]
    fn test_config_roundtrip_json() {
        let config = OrchestratorConfig::default().with_scorer("custom");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: OrchestratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scorer_id, "custom");
    }
}
