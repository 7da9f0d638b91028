//! 路由模块
//!
//! ## 模块结构
//!
//! - `strategy` - 选择策略 trait 和注册表
//! - `strategies` - 内置策略实现（quality/cost/speed/balanced/specific）
//! - `selector` - 链选择器，产出降级链

mod selector;
pub mod strategies;
mod strategy;

pub use selector::{ChainSelector, RoutingDecision};
pub use strategies::{
    create_default_registry, create_registry_with_weights, register_builtin_strategies,
    BalancedStrategy, CostStrategy, QualityStrategy, SpecificStrategy, SpeedStrategy,
};
pub use strategy::{
    BalancedWeights, ChainOrdering, SelectionStrategy, StrategyError, StrategyKind,
    StrategyRegistry, StrategyResult,
};
