//! 脚本化适配器（测试用）
//!
//! 按预设脚本逐次返回结果，并记录每次调用，供调度/锦标赛/流式
//! 组件的测试使用。

use crate::adapter::{
    AdapterError, AdapterStream, ProviderAdapter, ProviderRequest, ProviderResponse, StreamDelta,
};
use async_trait::async_trait;
use modelcast_core::models::{FinishReason, TokenUsage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// 脚本化的单次结局
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// 成功返回内容
    Success { content: String, latency_ms: u64 },
    /// 暂时性失败
    Transient { detail: String },
    /// 终止性失败
    Terminal { detail: String },
    /// 挂起指定时长后才返回（配合外层超时模拟超时）
    Hang { hang_ms: u64 },
}

/// 脚本化适配器
///
/// 结局队列耗尽后默认返回成功。
pub struct ScriptedAdapter {
    provider_id: String,
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    calls: Mutex<Vec<String>>,
    stream_chunks: Mutex<Vec<String>>,
    /// 流式输出完所有 chunk 后保持挂起（测试取消用）
    hold_stream_open: bool,
}

impl ScriptedAdapter {
    pub fn new(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            stream_chunks: Mutex::new(vec!["你".to_string(), "好".to_string()]),
            hold_stream_open: false,
        }
    }

    pub fn with_outcome(self, outcome: ScriptedOutcome) -> Self {
        self.outcomes.lock().push_back(outcome);
        self
    }

    pub fn with_stream_chunks(self, chunks: Vec<&str>) -> Self {
        *self.stream_chunks.lock() = chunks.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_held_stream(mut self) -> Self {
        self.hold_stream_open = true;
        self
    }

    pub fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// 已调用的模型 ID 列表（按顺序）
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(ScriptedOutcome::Success {
                content: "ok".to_string(),
                latency_ms: 0,
            })
    }

    fn record_call(&self, model_id: &str) {
        self.calls.lock().push(model_id.to_string());
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.provider_id
    }

    async fn call(
        &self,
        request: ProviderRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse, AdapterError> {
        self.record_call(&request.model_id);

        match self.next_outcome() {
            ScriptedOutcome::Success {
                content,
                latency_ms,
            } => {
                if latency_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(latency_ms)).await;
                }
                let output_tokens = ((content.chars().count() / 4).max(1)) as u32;
                Ok(ProviderResponse {
                    content,
                    usage: TokenUsage::new(10, output_tokens),
                    finish_reason: FinishReason::Stop,
                })
            }
            ScriptedOutcome::Transient { detail } => Err(AdapterError::transient(detail)),
            ScriptedOutcome::Terminal { detail } => Err(AdapterError::terminal(detail)),
            ScriptedOutcome::Hang { hang_ms } => {
                tokio::time::sleep(Duration::from_millis(hang_ms)).await;
                Ok(ProviderResponse {
                    content: "late".to_string(),
                    usage: TokenUsage::new(10, 1),
                    finish_reason: FinishReason::Stop,
                })
            }
        }
    }

    async fn stream(
        &self,
        request: ProviderRequest,
        _timeout: Duration,
    ) -> Result<AdapterStream, AdapterError> {
        self.record_call(&request.model_id);

        match self.next_outcome() {
            ScriptedOutcome::Transient { detail } => return Err(AdapterError::transient(detail)),
            ScriptedOutcome::Terminal { detail } => return Err(AdapterError::terminal(detail)),
            _ => {}
        }

        let chunks = self.stream_chunks.lock().clone();
        let hold = self.hold_stream_open;
        let stream = async_stream::stream! {
            let mut output_tokens = 0u32;
            for chunk in chunks {
                output_tokens += ((chunk.chars().count() / 4).max(1)) as u32;
                yield Ok(StreamDelta::chunk(chunk));
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            if hold {
                // 永不结束，等调用方取消
                futures::future::pending::<()>().await;
            }
            yield Ok(StreamDelta::finished(
                TokenUsage::new(10, output_tokens),
                FinishReason::Stop,
            ));
        };
        Ok(Box::pin(stream))
    }
}
