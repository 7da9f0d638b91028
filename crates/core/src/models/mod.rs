//! 数据模型模块
//!
//! Provider/模型描述符、任务与结果类型。

mod outcome;
mod provider;
mod task;

pub use outcome::{
    AttemptOutcome, AttemptRecord, CandidateResult, CompletionResult, ConsensusResult,
    FinishReason, ScoredCandidate, TokenUsage,
};
pub use provider::{
    Capability, ModelDescriptor, ProviderDescriptor, QualityTier, RateQuota, SpeedTier,
};
pub use task::{Task, TaskConstraints};
