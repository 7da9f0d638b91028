//! 成本优先策略
//!
//! 按估算成本从低到高排序。估算 = 输出上限 × 输出单价 + 提示词估算
//! tokens × 输入单价。

use super::estimated_task_cost;
use crate::models::{ModelDescriptor, Task};
use crate::routing::strategy::{
    ChainOrdering, SelectionStrategy, StrategyError, StrategyKind, StrategyResult,
};

/// 成本优先策略
pub struct CostStrategy;

impl CostStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CostStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for CostStrategy {
    fn id(&self) -> &str {
        StrategyKind::Cost.as_str()
    }

    fn display_name(&self) -> &str {
        "成本优先"
    }

    fn description(&self) -> &str {
        "按估算成本从低到高排序"
    }

    fn order(&self, pool: &[ModelDescriptor], task: &Task) -> StrategyResult<ChainOrdering> {
        if pool.is_empty() {
            return Err(StrategyError::NoAvailableModels);
        }

        let mut models = pool.to_vec();
        models.sort_by(|a, b| {
            let cost_a = estimated_task_cost(a, task);
            let cost_b = estimated_task_cost(b, task);
            cost_a
                .partial_cmp(&cost_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let cheapest = estimated_task_cost(&models[0], task);
        Ok(ChainOrdering {
            models,
            reason: format!("成本优先排序，首选估算成本 {cheapest:.6} USD"),
        })
    }
}
