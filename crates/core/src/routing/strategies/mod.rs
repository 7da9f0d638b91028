//! 内置选择策略
//!
//! quality / cost / speed / balanced / specific 五种排序策略。

mod balanced;
mod cost;
mod quality;
mod specific;
mod speed;

pub use balanced::BalancedStrategy;
pub use cost::CostStrategy;
pub use quality::QualityStrategy;
pub use specific::SpecificStrategy;
pub use speed::SpeedStrategy;

use super::strategy::{BalancedWeights, StrategyRegistry};
use crate::models::{ModelDescriptor, Task};
use std::sync::Arc;

/// 估算模型执行任务的成本（USD）
///
/// 按任务的输出上限与提示词长度估算，用于 cost/balanced 排序。
pub(crate) fn estimated_task_cost(model: &ModelDescriptor, task: &Task) -> f64 {
    model.estimated_cost(
        task.estimated_input_tokens(),
        task.constraints.max_output_tokens,
    )
}

/// 注册所有内置策略
pub fn register_builtin_strategies(registry: &mut StrategyRegistry, weights: BalancedWeights) {
    registry.register(Arc::new(QualityStrategy::new()));
    registry.register(Arc::new(CostStrategy::new()));
    registry.register(Arc::new(SpeedStrategy::new()));
    registry.register(Arc::new(BalancedStrategy::new(weights)));
    registry.register(Arc::new(SpecificStrategy::new()));
}

/// 创建带有内置策略的注册表
pub fn create_default_registry() -> StrategyRegistry {
    create_registry_with_weights(BalancedWeights::default())
}

/// 使用指定均衡权重创建注册表
pub fn create_registry_with_weights(weights: BalancedWeights) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    register_builtin_strategies(&mut registry, weights);
    registry
}
