//! 速度优先策略
//!
//! 按速度等级从快到慢排序。

use crate::models::{ModelDescriptor, Task};
use crate::routing::strategy::{
    ChainOrdering, SelectionStrategy, StrategyError, StrategyKind, StrategyResult,
};

/// 速度优先策略
pub struct SpeedStrategy;

impl SpeedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpeedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for SpeedStrategy {
    fn id(&self) -> &str {
        StrategyKind::Speed.as_str()
    }

    fn display_name(&self) -> &str {
        "速度优先"
    }

    fn description(&self) -> &str {
        "按速度等级从快到慢排序"
    }

    fn order(&self, pool: &[ModelDescriptor], _task: &Task) -> StrategyResult<ChainOrdering> {
        if pool.is_empty() {
            return Err(StrategyError::NoAvailableModels);
        }

        let mut models = pool.to_vec();
        models.sort_by(|a, b| {
            a.speed_tier
                .level()
                .cmp(&b.speed_tier.level())
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(ChainOrdering {
            models,
            reason: "速度优先排序".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, SpeedTier};

    fn model(id: &str, tier: SpeedTier) -> ModelDescriptor {
        ModelDescriptor::new(id, "p")
            .with_capability(Capability::Chat)
            .with_speed(tier)
    }

    #[test]
    fn test_orders_by_speed_asc() {
        let strategy = SpeedStrategy::new();
        let pool = vec![
            model("slowpoke", SpeedTier::Slow),
            model("flash", SpeedTier::Fast),
            model("middling", SpeedTier::Medium),
        ];
        let task = Task::new(Capability::Chat, "你好");

        let ordering = strategy.order(&pool, &task).unwrap();
        let ids: Vec<&str> = ordering.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["flash", "middling", "slowpoke"]);
    }
}
