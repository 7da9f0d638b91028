//! 均衡策略
//!
//! 质量、成本倒数、速度倒数三项归一化后加权求和，权重可配置，
//! 默认三等分。

use super::estimated_task_cost;
use crate::models::{ModelDescriptor, Task};
use crate::routing::strategy::{
    BalancedWeights, ChainOrdering, SelectionStrategy, StrategyError, StrategyKind,
    StrategyResult,
};

const MIN_COST: f64 = 1e-9;

/// 均衡策略
pub struct BalancedStrategy {
    weights: BalancedWeights,
}

impl BalancedStrategy {
    pub fn new(weights: BalancedWeights) -> Self {
        Self {
            weights: weights.normalized(),
        }
    }

    /// 计算单个候选的加权得分
    fn score(&self, model: &ModelDescriptor, task: &Task, min_cost: f64) -> f64 {
        let quality = model.quality_tier.level() as f64
            / crate::models::QualityTier::Flagship.level() as f64;
        // 成本越低得分越高；零成本按最小值处理避免除零
        let cost = estimated_task_cost(model, task).max(MIN_COST);
        let cost_score = min_cost / cost;
        // 速度等级越小越快
        let speed_score = crate::models::SpeedTier::Fast.level() as f64
            / model.speed_tier.level() as f64;

        self.weights.quality * quality
            + self.weights.cost * cost_score
            + self.weights.speed * speed_score
    }
}

impl Default for BalancedStrategy {
    fn default() -> Self {
        Self::new(BalancedWeights::default())
    }
}

impl SelectionStrategy for BalancedStrategy {
    fn id(&self) -> &str {
        StrategyKind::Balanced.as_str()
    }

    fn display_name(&self) -> &str {
        "均衡"
    }

    fn description(&self) -> &str {
        "质量/成本/速度加权排序"
    }

    fn order(&self, pool: &[ModelDescriptor], task: &Task) -> StrategyResult<ChainOrdering> {
        if pool.is_empty() {
            return Err(StrategyError::NoAvailableModels);
        }

        let min_cost = pool
            .iter()
            .map(|m| estimated_task_cost(m, task).max(MIN_COST))
            .fold(f64::INFINITY, f64::min);

        let mut models = pool.to_vec();
        models.sort_by(|a, b| {
            let score_a = self.score(a, task, min_cost);
            let score_b = self.score(b, task, min_cost);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let top = self.score(&models[0], task, min_cost);
        Ok(ChainOrdering {
            models,
            reason: format!("均衡排序，首选得分 {top:.3}"),
        })
    }
}
