//! Provider 适配器接口
//!
//! 所有厂商后端收敛到同一个调用/流式接口；调度引擎只依赖这个接口，
//! 不接触任何厂商专有类型。错误在适配器边界完成暂时性/终止性分类。

use async_trait::async_trait;
use futures::stream::BoxStream;
use modelcast_core::models::{FinishReason, Task, TokenUsage};
use std::time::Duration;
use thiserror::Error;

/// 适配器错误
///
/// Transient：超时、5xx、厂商限流等值得换候选重试的失败。
/// Terminal：请求本身无效（格式、鉴权、内容策略），换候选也无济于事。
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("暂时性失败 (status={status:?}): {detail}")]
    Transient { status: Option<u16>, detail: String },

    #[error("终止性失败 (status={status:?}): {detail}")]
    Terminal { status: Option<u16>, detail: String },
}

impl AdapterError {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            detail: detail.into(),
        }
    }

    pub fn terminal(detail: impl Into<String>) -> Self {
        Self::Terminal {
            status: None,
            detail: detail.into(),
        }
    }

    /// 按 HTTP 状态码分类
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        if matches!(status, 408 | 429) || (500..=599).contains(&status) {
            Self::Transient {
                status: Some(status),
                detail: detail.into(),
            }
        } else {
            Self::Terminal {
                status: Some(status),
                detail: detail.into(),
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Transient { detail, .. } | Self::Terminal { detail, .. } => detail,
        }
    }
}

/// 发给适配器的统一请求
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model_id: String,
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl ProviderRequest {
    /// 从任务构造请求
    pub fn from_task(task: &Task, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            prompt: task.prompt.clone(),
            max_output_tokens: task.constraints.max_output_tokens,
            temperature: task.constraints.temperature,
        }
    }
}

/// 适配器的完整响应
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

/// 流式增量
///
/// `finish_reason` 为 Some 时表示上游流结束，可附带最终用量。
#[derive(Debug, Clone)]
pub struct StreamDelta {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            finish_reason: None,
        }
    }

    pub fn finished(usage: TokenUsage, finish_reason: FinishReason) -> Self {
        Self {
            content: String::new(),
            usage: Some(usage),
            finish_reason: Some(finish_reason),
        }
    }
}

/// 适配器返回的增量流
pub type AdapterStream = BoxStream<'static, Result<StreamDelta, AdapterError>>;

/// Provider 适配器
///
/// 每个厂商端点实现一次；内部负责自家的报文转换。
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 所属 Provider ID
    fn id(&self) -> &str;

    /// 发起一次完整调用
    async fn call(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse, AdapterError>;

    /// 发起一次流式调用，返回增量流
    async fn stream(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> Result<AdapterStream, AdapterError>;
}
