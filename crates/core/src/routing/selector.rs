//! 链选择器
//!
//! 把 (任务, 策略, 注册表快照) 变成一条有序降级链。链顺序是纯函数，
//! 没有隐藏随机性；熔断中的 Provider 在进入策略排序前就被整体过滤。

use super::strategies::create_default_registry;
use super::strategy::{StrategyError, StrategyKind, StrategyRegistry};
use crate::errors::{OrchestrateError, OrchestrateResult};
use crate::models::Task;
use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 路由决策
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// 有序候选模型 ID（降级链），保证非空
    pub chain: Vec<String>,
    /// 使用的策略
    pub strategy: StrategyKind,
    /// 排序原因
    pub reason: String,
    /// 决策时间戳（Unix 秒）
    pub decided_at: i64,
}

/// 链选择器
pub struct ChainSelector {
    registry: Arc<ModelRegistry>,
    strategies: StrategyRegistry,
    /// 降级链最大长度
    max_chain_length: usize,
}

impl ChainSelector {
    /// 使用内置策略创建
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self::with_strategies(registry, create_default_registry())
    }

    /// 使用自定义策略注册表创建
    pub fn with_strategies(registry: Arc<ModelRegistry>, strategies: StrategyRegistry) -> Self {
        Self {
            registry,
            strategies,
            max_chain_length: 5,
        }
    }

    /// 设置降级链最大长度
    pub fn with_max_chain_length(mut self, max: usize) -> Self {
        self.max_chain_length = max.max(1);
        self
    }

    /// 构建降级链
    pub fn select(&self, task: &Task, strategy: StrategyKind) -> OrchestrateResult<RoutingDecision> {
        let pool = self.registry.eligible_models(task.task_type);

        let handler = self.strategies.get(strategy.as_str()).ok_or_else(|| {
            OrchestrateError::Config {
                detail: format!("策略未注册: {strategy}"),
            }
        })?;

        let ordering = handler
            .order(&pool, task)
            .map_err(|e| Self::map_strategy_error(e, task))?;

        let chain: Vec<String> = ordering
            .models
            .into_iter()
            .take(self.max_chain_length)
            .map(|m| m.id)
            .collect();

        if chain.is_empty() {
            return Err(OrchestrateError::NoEligibleModels {
                task_type: task.task_type,
            });
        }

        tracing::debug!(
            "[Selector] task={} strategy={} chain={:?}",
            task.id,
            strategy,
            chain
        );

        Ok(RoutingDecision {
            chain,
            strategy,
            reason: ordering.reason,
            decided_at: chrono::Utc::now().timestamp(),
        })
    }

    fn map_strategy_error(error: StrategyError, task: &Task) -> OrchestrateError {
        match error {
            StrategyError::NoAvailableModels => OrchestrateError::NoEligibleModels {
                task_type: task.task_type,
            },
            StrategyError::PinnedModelUnavailable { model_id, detail } => {
                OrchestrateError::TerminalRequest { model_id, detail }
            }
            StrategyError::StrategyNotFound(id) => OrchestrateError::Config {
                detail: format!("策略不存在: {id}"),
            },
            StrategyError::SelectionFailed(detail) => OrchestrateError::Config { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, ModelDescriptor, ProviderDescriptor, QualityTier, SpeedTier};
    use crate::registry::BreakerConfig;

    fn seed_registry() -> Arc<ModelRegistry> {
        let registry = Arc::new(ModelRegistry::with_breaker_config(BreakerConfig::new(
            1, 60_000, 60_000,
        )));
        registry.register_provider(
            ProviderDescriptor::new("anthropic", "ANTHROPIC_API_KEY")
                .with_capability(Capability::Chat),
        );
        registry.register_provider(
            ProviderDescriptor::new("openai", "OPENAI_API_KEY").with_capability(Capability::Chat),
        );
        registry
            .register_model(
                ModelDescriptor::new("claude-sonnet", "anthropic")
                    .with_capability(Capability::Chat)
                    .with_quality(QualityTier::Premium)
                    .with_speed(SpeedTier::Medium)
                    .with_pricing(3.0, 15.0),
            )
            .unwrap();
        registry
            .register_model(
                ModelDescriptor::new("gpt-4o-mini", "openai")
                    .with_capability(Capability::Chat)
                    .with_quality(QualityTier::Standard)
                    .with_speed(SpeedTier::Fast)
                    .with_pricing(0.15, 0.6),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_quality_chain_order() {
        let selector = ChainSelector::new(seed_registry());
        let task = Task::new(Capability::Chat, "你好");

        let decision = selector.select(&task, StrategyKind::Quality).unwrap();
        assert_eq!(decision.chain, vec!["claude-sonnet", "gpt-4o-mini"]);
        assert_eq!(decision.strategy, StrategyKind::Quality);
    }

    #[test]
    fn test_cost_chain_order() {
        let selector = ChainSelector::new(seed_registry());
        let task = Task::new(Capability::Chat, "你好");

        let decision = selector.select(&task, StrategyKind::Cost).unwrap();
        assert_eq!(decision.chain, vec!["gpt-4o-mini", "claude-sonnet"]);
    }

    #[test]
    fn test_no_eligible_models() {
        let selector = ChainSelector::new(seed_registry());
        let task = Task::new(Capability::Vision, "看看这张图");

        assert!(matches!(
            selector.select(&task, StrategyKind::Quality),
            Err(OrchestrateError::NoEligibleModels { .. })
        ));
    }

    #[test]
    fn test_open_breaker_excluded_from_chain() {
        let registry = seed_registry();
        // 阈值为 1，一次失败即熔断
        registry.report_outcome("claude-sonnet", false).unwrap();

        let selector = ChainSelector::new(registry);
        let task = Task::new(Capability::Chat, "你好");

        let decision = selector.select(&task, StrategyKind::Quality).unwrap();
        assert_eq!(decision.chain, vec!["gpt-4o-mini"]);
    }

    #[test]
    fn test_specific_pinned_open_provider_is_terminal() {
        let registry = seed_registry();
        registry.report_outcome("claude-sonnet", false).unwrap();

        let selector = ChainSelector::new(registry);
        let task = Task::new(Capability::Chat, "你好").with_pinned_model("claude-sonnet");

        assert!(matches!(
            selector.select(&task, StrategyKind::Specific),
            Err(OrchestrateError::TerminalRequest { .. })
        ));
    }

    #[test]
    fn test_max_chain_length_truncates() {
        let selector = ChainSelector::new(seed_registry()).with_max_chain_length(1);
        let task = Task::new(Capability::Chat, "你好");

        let decision = selector.select(&task, StrategyKind::Quality).unwrap();
        assert_eq!(decision.chain.len(), 1);
    }

    #[test]
    fn test_chain_is_deterministic() {
        let selector = ChainSelector::new(seed_registry());
        let task = Task::new(Capability::Chat, "你好");

        let first = selector.select(&task, StrategyKind::Balanced).unwrap();
        for _ in 0..16 {
            let again = selector.select(&task, StrategyKind::Balanced).unwrap();
            assert_eq!(first.chain, again.chain);
        }
    }
}
