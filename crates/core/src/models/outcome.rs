//! 调用结果类型
//!
//! 单次尝试记录、完成结果与锦标赛共识结果。

use serde::{Deserialize, Serialize};

/// Token 用量
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// 正常结束
    Stop,
    /// 达到输出上限
    Length,
    /// 内容策略拦截
    ContentFilter,
    /// 调用方取消
    Cancelled,
}

/// 单次尝试的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// 成功
    Success,
    /// 暂时性失败（超时、5xx、Provider 限流）
    TransientFailure,
    /// 终止性失败（请求本身无效）
    TerminalFailure,
    /// 本地限流未放行
    RateLimited,
    /// Provider 熔断中，未发起调用
    CircuitOpen,
}

/// 尝试记录
///
/// 每个被尝试过的候选都会留下一条记录，用于可观测性与调试。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 模型 ID
    pub model_id: String,
    /// Provider ID
    pub provider_id: String,
    /// 结局
    pub outcome: AttemptOutcome,
    /// 失败详情（成功时为空）
    pub detail: String,
    /// 耗时（毫秒）
    pub latency_ms: u64,
}

impl AttemptRecord {
    pub fn success(model_id: &str, provider_id: &str, latency_ms: u64) -> Self {
        Self {
            model_id: model_id.to_string(),
            provider_id: provider_id.to_string(),
            outcome: AttemptOutcome::Success,
            detail: String::new(),
            latency_ms,
        }
    }

    pub fn failure(
        model_id: &str,
        provider_id: &str,
        outcome: AttemptOutcome,
        detail: &str,
        latency_ms: u64,
    ) -> Self {
        Self {
            model_id: model_id.to_string(),
            provider_id: provider_id.to_string(),
            outcome,
            detail: detail.to_string(),
            latency_ms,
        }
    }
}

/// 完成结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    /// 生成内容
    pub content: String,
    /// Token 用量
    pub usage: TokenUsage,
    /// 本次成功调用的耗时（毫秒）
    pub latency_ms: u64,
    /// 实际使用的 Provider
    pub provider_id: String,
    /// 实际使用的模型
    pub model_id: String,
    /// 结束原因
    pub finish_reason: FinishReason,
    /// 估算成本（USD）
    pub estimated_cost_usd: f64,
    /// 完整尝试历史（按尝试顺序）
    pub attempts: Vec<AttemptRecord>,
}

/// 锦标赛中单个候选的成功结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub model_id: String,
    pub provider_id: String,
    pub content: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
}

/// 带评分的候选结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateResult,
    /// 评分（越高越好）
    pub score: f64,
}

/// 锦标赛共识结果
///
/// 仅当至少一个候选成功时才会产生；winner 一定来自成功候选。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// 胜出者
    pub winner: ScoredCandidate,
    /// 所有成功候选及其评分（按候选提交顺序）
    pub scored: Vec<ScoredCandidate>,
    /// 使用的评分器 ID
    pub scorer_id: String,
    /// 完整尝试历史（含失败候选）
    pub attempts: Vec<AttemptRecord>,
}
