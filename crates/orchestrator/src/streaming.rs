//! 流式会话管理
//!
//! 每个会话只有一个上游候选：降级链只在流建立之前起作用，第一个
//! chunk 之后不再换候选。增量按到达顺序投递。取消会中止在途网络
//! 操作、把限流令牌退回桶里，并用取消标记（而非错误）终止序列。

use crate::attempt::{task_deadline, Shared};
use modelcast_core::errors::{OrchestrateError, OrchestrateResult};
use modelcast_core::models::{
    AttemptOutcome, AttemptRecord, FinishReason, Task, TokenUsage,
};
use modelcast_core::routing::RoutingDecision;
use modelcast_infra::Permit;
use modelcast_providers::adapter::{AdapterError, AdapterStream, ProviderRequest};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 流式事件
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// 增量内容
    Delta { content: String },
    /// 正常结束
    Completed {
        usage: TokenUsage,
        finish_reason: FinishReason,
    },
    /// 调用方取消（终止标记，不是错误）
    Cancelled,
}

/// 流式会话句柄
pub struct StreamHandle {
    events: mpsc::Receiver<OrchestrateResult<StreamEvent>>,
    cancel: CancellationToken,
    model_id: String,
    provider_id: String,
}

impl StreamHandle {
    /// 取下一个事件；序列结束返回 None
    pub async fn next_event(&mut self) -> Option<OrchestrateResult<StreamEvent>> {
        self.events.recv().await
    }

    /// 取消会话
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 实际选中的模型
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// 实际选中的 Provider
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

/// 流式会话管理器
pub struct StreamManager {
    shared: Shared,
    candidate_timeout: Duration,
    max_task_deadline_ms: u64,
}

impl StreamManager {
    pub(crate) fn new(
        shared: Shared,
        candidate_timeout_ms: u64,
        max_task_deadline_ms: u64,
    ) -> Self {
        Self {
            shared,
            candidate_timeout: Duration::from_millis(candidate_timeout_ms.max(1)),
            max_task_deadline_ms,
        }
    }

    /// 沿降级链打开一个流式会话
    ///
    /// 流建立失败（第一个 chunk 之前）按暂时性失败推进链；建立成功
    /// 之后错误原样上浮，不再降级。
    pub async fn open(
        &self,
        task: &Task,
        decision: &RoutingDecision,
    ) -> OrchestrateResult<StreamHandle> {
        let deadline = task_deadline(task, self.max_task_deadline_ms);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for model_id in &decision.chain {
            if deadline.is_expired() {
                return Err(OrchestrateError::DeadlineExceeded { attempts });
            }

            let Some(model) = self.shared.registry.model(model_id) else {
                return Err(OrchestrateError::UnknownModel {
                    model_id: model_id.clone(),
                });
            };
            let provider_id = model.provider_id.clone();

            let Some(adapter) = self.shared.adapter(&provider_id) else {
                return Err(OrchestrateError::UnknownProvider { provider_id });
            };

            if !self.shared.registry.try_acquire(&provider_id) {
                attempts.push(AttemptRecord::failure(
                    model_id,
                    &provider_id,
                    AttemptOutcome::CircuitOpen,
                    "Provider 熔断中",
                    0,
                ));
                continue;
            }

            let permit = match self
                .shared
                .limiter
                .acquire(&provider_id, Some(deadline.remaining()))
                .await
            {
                Ok(permit) => permit,
                Err(e) => {
                    self.shared.registry.release_probe(&provider_id);
                    attempts.push(AttemptRecord::failure(
                        model_id,
                        &provider_id,
                        AttemptOutcome::RateLimited,
                        &e.to_string(),
                        0,
                    ));
                    continue;
                }
            };

            let timeout = deadline.clamp(self.candidate_timeout);
            let request = ProviderRequest::from_task(task, model_id);

            match tokio::time::timeout(timeout, adapter.stream(request, timeout)).await {
                Ok(Ok(upstream)) => {
                    tracing::info!(
                        "[Stream] task={} 会话建立 model={} provider={}",
                        task.id,
                        model_id,
                        provider_id
                    );
                    return Ok(self.spawn_session(upstream, permit, model_id, &provider_id));
                }
                Ok(Err(AdapterError::Terminal { detail, .. })) => {
                    self.shared.registry.release_probe(&provider_id);
                    return Err(OrchestrateError::TerminalRequest {
                        model_id: model_id.clone(),
                        detail,
                    });
                }
                Ok(Err(AdapterError::Transient { detail, .. })) => {
                    let _ = self.shared.registry.report_outcome(model_id, false);
                    attempts.push(AttemptRecord::failure(
                        model_id,
                        &provider_id,
                        AttemptOutcome::TransientFailure,
                        &detail,
                        0,
                    ));
                }
                Err(_) => {
                    let _ = self.shared.registry.report_outcome(model_id, false);
                    attempts.push(AttemptRecord::failure(
                        model_id,
                        &provider_id,
                        AttemptOutcome::TransientFailure,
                        "打开流超时",
                        timeout.as_millis() as u64,
                    ));
                }
            }
        }

        Err(OrchestrateError::AllCandidatesExhausted { attempts })
    }

    fn spawn_session(
        &self,
        upstream: AdapterStream,
        permit: Permit,
        model_id: &str,
        provider_id: &str,
    ) -> StreamHandle {
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        tokio::spawn(pump_session(
            self.shared.clone(),
            upstream,
            permit,
            model_id.to_string(),
            provider_id.to_string(),
            tx,
            cancel.clone(),
        ));

        StreamHandle {
            events: rx,
            cancel,
            model_id: model_id.to_string(),
            provider_id: provider_id.to_string(),
        }
    }
}

/// 会话泵：把上游增量按到达顺序转发给调用方
async fn pump_session(
    shared: Shared,
    mut upstream: AdapterStream,
    permit: Permit,
    model_id: String,
    provider_id: String,
    tx: mpsc::Sender<OrchestrateResult<StreamEvent>>,
    cancel: CancellationToken,
) {
    let mut permit = Some(permit);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // 中止在途操作（丢弃上游流）、退回令牌、发取消标记
                if let Some(p) = permit.take() {
                    p.refund();
                }
                shared.registry.release_probe(&provider_id);
                tracing::info!("[Stream] model={} 会话已取消", model_id);
                let _ = tx.send(Ok(StreamEvent::Cancelled)).await;
                return;
            }
            item = upstream.next() => match item {
                Some(Ok(delta)) => {
                    if let Some(finish_reason) = delta.finish_reason {
                        let _ = shared.registry.report_outcome(&model_id, true);
                        let _ = tx
                            .send(Ok(StreamEvent::Completed {
                                usage: delta.usage.unwrap_or_default(),
                                finish_reason,
                            }))
                            .await;
                        return;
                    }
                    let event = StreamEvent::Delta {
                        content: delta.content,
                    };
                    if tx.send(Ok(event)).await.is_err() {
                        // 接收端已放弃，视同取消
                        if let Some(p) = permit.take() {
                            p.refund();
                        }
                        shared.registry.release_probe(&provider_id);
                        return;
                    }
                }
                Some(Err(e)) => {
                    let err = if e.is_transient() {
                        let _ = shared.registry.report_outcome(&model_id, false);
                        OrchestrateError::TransientProvider {
                            model_id: model_id.clone(),
                            detail: e.detail().to_string(),
                        }
                    } else {
                        shared.registry.release_probe(&provider_id);
                        OrchestrateError::TerminalRequest {
                            model_id: model_id.clone(),
                            detail: e.detail().to_string(),
                        }
                    };
                    let _ = tx.send(Err(err)).await;
                    return;
                }
                None => {
                    let _ = shared.registry.report_outcome(&model_id, false);
                    let _ = tx
                        .send(Err(OrchestrateError::TransientProvider {
                            model_id: model_id.clone(),
                            detail: "上游流提前结束".to_string(),
                        }))
                        .await;
                    return;
                }
            }
        }
    }
}
