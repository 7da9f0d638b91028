//! 质量优先策略
//!
//! 按质量等级降序排序，同级按模型 ID 升序，保证稳定确定。

use crate::models::{ModelDescriptor, Task};
use crate::routing::strategy::{
    ChainOrdering, SelectionStrategy, StrategyError, StrategyKind, StrategyResult,
};

/// 质量优先策略
pub struct QualityStrategy;

impl QualityStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for QualityStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for QualityStrategy {
    fn id(&self) -> &str {
        StrategyKind::Quality.as_str()
    }

    fn display_name(&self) -> &str {
        "质量优先"
    }

    fn description(&self) -> &str {
        "按质量等级从高到低排序"
    }

    fn order(&self, pool: &[ModelDescriptor], _task: &Task) -> StrategyResult<ChainOrdering> {
        if pool.is_empty() {
            return Err(StrategyError::NoAvailableModels);
        }

        let mut models = pool.to_vec();
        models.sort_by(|a, b| {
            b.quality_tier
                .level()
                .cmp(&a.quality_tier.level())
                .then_with(|| a.id.cmp(&b.id))
        });

        let top = models[0].quality_tier;
        Ok(ChainOrdering {
            models,
            reason: format!("质量优先排序，首选等级 {top:?}"),
        })
    }
}
