//! 调度引擎
//!
//! 严格顺序地走降级链：候选 k 结束之前绝不开始候选 k+1，避免重复
//! 计费。暂时性失败退避后换下一个候选；终止性失败立即返回；链走完
//! 仍失败则带完整尝试历史返回。

use crate::attempt::{execute_candidate, task_deadline, Shared};
use modelcast_core::errors::{OrchestrateError, OrchestrateResult};
use modelcast_core::models::{AttemptRecord, CompletionResult, Task};
use modelcast_core::routing::RoutingDecision;
use modelcast_infra::Retrier;
use std::time::Duration;

/// 调度引擎
pub struct DispatchEngine {
    shared: Shared,
    retrier: Retrier,
    candidate_timeout: Duration,
    max_task_deadline_ms: u64,
}

impl DispatchEngine {
    pub(crate) fn new(
        shared: Shared,
        retrier: Retrier,
        candidate_timeout_ms: u64,
        max_task_deadline_ms: u64,
    ) -> Self {
        Self {
            shared,
            retrier,
            candidate_timeout: Duration::from_millis(candidate_timeout_ms.max(1)),
            max_task_deadline_ms,
        }
    }

    /// 沿降级链调度任务
    pub async fn dispatch(
        &self,
        decision: &RoutingDecision,
        task: &Task,
    ) -> OrchestrateResult<CompletionResult> {
        let deadline = task_deadline(task, self.max_task_deadline_ms);
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let total = decision.chain.len();
        let mut transient_failures = 0u32;

        for (index, model_id) in decision.chain.iter().enumerate() {
            if deadline.is_expired() {
                tracing::warn!(
                    "[Dispatch] task={} 截止时间已到，停止走链 (已尝试 {}/{})",
                    task.id,
                    attempts.len(),
                    total
                );
                return Err(OrchestrateError::DeadlineExceeded { attempts });
            }

            tracing::info!(
                "[Dispatch] task={} candidate={}/{} model={}",
                task.id,
                index + 1,
                total,
                model_id
            );

            match execute_candidate(
                &self.shared,
                task,
                model_id,
                self.candidate_timeout,
                &deadline,
            )
            .await
            {
                Ok(success) => {
                    attempts.push(AttemptRecord::success(
                        model_id,
                        &success.model.provider_id,
                        success.latency_ms,
                    ));
                    let usage = success.response.usage;
                    let estimated_cost_usd = success
                        .model
                        .estimated_cost(usage.input_tokens, usage.output_tokens);
                    tracing::info!(
                        "[Dispatch] task={} 成功 model={} latency_ms={} attempts={}",
                        task.id,
                        model_id,
                        success.latency_ms,
                        attempts.len()
                    );
                    return Ok(CompletionResult {
                        content: success.response.content,
                        usage,
                        latency_ms: success.latency_ms,
                        provider_id: success.model.provider_id,
                        model_id: model_id.clone(),
                        finish_reason: success.response.finish_reason,
                        estimated_cost_usd,
                        attempts,
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        "[Dispatch] task={} model={} 失败 outcome={:?} detail={}",
                        task.id,
                        model_id,
                        failure.outcome,
                        failure.detail
                    );
                    attempts.push(failure.record(model_id));

                    if failure.is_terminal() {
                        // 请求本身的问题，换候选无济于事
                        return Err(OrchestrateError::TerminalRequest {
                            model_id: model_id.clone(),
                            detail: failure.detail,
                        });
                    }

                    // 暂时性失败：还有下一个候选时退避后继续
                    if index + 1 < total {
                        let delay = deadline.clamp(self.retrier.backoff_delay(transient_failures));
                        transient_failures += 1;
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        tracing::warn!(
            "[Dispatch] task={} 降级链耗尽 (尝试 {} 个候选)",
            task.id,
            attempts.len()
        );
        Err(OrchestrateError::AllCandidatesExhausted { attempts })
    }
}
