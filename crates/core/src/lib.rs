//! modelcast 核心模块
//!
//! 提供多 Provider 路由编排的基础构件。
//!
//! ## 模块结构
//!
//! - `models` - Provider/模型描述符、任务与结果类型
//! - `errors` - 错误分类
//! - `registry` - 注册表与熔断器
//! - `routing` - 选择策略与链选择器
//! - `logger` - 日志初始化

pub mod errors;
pub mod logger;
pub mod models;
pub mod registry;
pub mod routing;

pub use errors::{OrchestrateError, OrchestrateResult};
pub use models::{
    AttemptOutcome, AttemptRecord, CandidateResult, Capability, CompletionResult,
    ConsensusResult, FinishReason, ModelDescriptor, ProviderDescriptor, QualityTier, RateQuota,
    ScoredCandidate, SpeedTier, Task, TaskConstraints, TokenUsage,
};
pub use registry::{BreakerConfig, BreakerSnapshot, CircuitState, ModelRegistry};
pub use routing::{
    BalancedWeights, ChainSelector, RoutingDecision, SelectionStrategy, StrategyKind,
    StrategyRegistry,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
