//! 错误类型模块
//!
//! 定义路由与调度过程中的错误分类。暂时性失败在调度引擎内部消化，
//! 只有最终不可恢复的结局才会跨组件边界返回给调用方。

use crate::models::{AttemptRecord, Capability};
use thiserror::Error;

/// 编排错误
#[derive(Error, Debug)]
pub enum OrchestrateError {
    /// 暂时性失败（超时、5xx、Provider 限流），仅在调度内部流转
    #[error("候选 {model_id} 暂时性失败: {detail}")]
    TransientProvider { model_id: String, detail: String },

    /// 请求本身无效（格式错误、鉴权失败、内容策略拒绝），不重试不降级
    #[error("请求无法被候选 {model_id} 处理: {detail}")]
    TerminalRequest { model_id: String, detail: String },

    /// 降级链走完，所有候选都是暂时性失败
    #[error("所有候选模型均告失败（尝试了 {} 个候选）", .attempts.len())]
    AllCandidatesExhausted { attempts: Vec<AttemptRecord> },

    /// 注册表中没有匹配任务能力标签的可用模型
    #[error("没有支持 {task_type} 能力的可用模型")]
    NoEligibleModels { task_type: Capability },

    /// Provider 熔断中（不直接暴露给调用方，仅在内部导致候选被排除）
    #[error("Provider {provider_id} 熔断中")]
    CircuitOpen { provider_id: String },

    /// 任务截止时间已到
    #[error("任务截止时间已到（已尝试 {} 个候选）", .attempts.len())]
    DeadlineExceeded { attempts: Vec<AttemptRecord> },

    /// 模型未注册
    #[error("模型未注册: {model_id}")]
    UnknownModel { model_id: String },

    /// Provider 未注册
    #[error("Provider 未注册: {provider_id}")]
    UnknownProvider { provider_id: String },

    /// 凭证解析失败
    #[error("凭证解析失败: {detail}")]
    Credential { detail: String },

    /// 配置错误
    #[error("配置错误: {detail}")]
    Config { detail: String },
}

impl OrchestrateError {
    /// 取出错误中携带的尝试历史（如果有）
    pub fn attempts(&self) -> Option<&[AttemptRecord]> {
        match self {
            OrchestrateError::AllCandidatesExhausted { attempts }
            | OrchestrateError::DeadlineExceeded { attempts } => Some(attempts),
            _ => None,
        }
    }
}

pub type OrchestrateResult<T> = Result<T, OrchestrateError>;
