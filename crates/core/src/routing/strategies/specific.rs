//! 指定模型策略
//!
//! 链中只有任务指定的那一个模型。指定模型不在候选池中（能力不匹配
//! 或所在 Provider 熔断）时直接报错，不做任何替代——调用方已明确
//! 放弃弹性。

use crate::models::{ModelDescriptor, Task};
use crate::routing::strategy::{
    ChainOrdering, SelectionStrategy, StrategyError, StrategyKind, StrategyResult,
};

/// 指定模型策略
pub struct SpecificStrategy;

impl SpecificStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpecificStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for SpecificStrategy {
    fn id(&self) -> &str {
        StrategyKind::Specific.as_str()
    }

    fn display_name(&self) -> &str {
        "指定模型"
    }

    fn description(&self) -> &str {
        "只使用任务指定的模型，不降级"
    }

    fn order(&self, pool: &[ModelDescriptor], task: &Task) -> StrategyResult<ChainOrdering> {
        let pinned = task.pinned_model.as_deref().ok_or_else(|| {
            StrategyError::SelectionFailed("specific 策略要求任务指定 pinned_model".to_string())
        })?;

        let model = pool.iter().find(|m| m.id == pinned).ok_or_else(|| {
            StrategyError::PinnedModelUnavailable {
                model_id: pinned.to_string(),
                detail: "模型不可用：能力不匹配、未注册或所在 Provider 熔断中".to_string(),
            }
        })?;

        Ok(ChainOrdering {
            models: vec![model.clone()],
            reason: format!("指定模型 {pinned}"),
        })
    }
}
