//! 锦标赛共识评估器
//!
//! 把任务以受限并发同时发给多个候选，各候选独立走限流/超时/分类
//! 路径，等待全部落定或全局截止时间先到。成功结果交给可插拔评分器，
//! 最高分胜出，平分按候选原始顺序取先者。

use crate::attempt::{execute_candidate, task_deadline, Shared};
use crate::scorer::Scorer;
use futures::StreamExt;
use modelcast_core::errors::{OrchestrateError, OrchestrateResult};
use modelcast_core::models::{
    AttemptOutcome, AttemptRecord, CandidateResult, ConsensusResult, ScoredCandidate, Task,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 锦标赛评估器
pub struct TournamentEvaluator {
    shared: Shared,
    candidate_timeout: Duration,
    max_task_deadline_ms: u64,
}

impl TournamentEvaluator {
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

    /// 评估一轮锦标赛
    pub async fn evaluate(
        &self,
        task: &Task,
        candidate_ids: &[String],
        concurrency_limit: usize,
        scorer: Arc<dyn Scorer>,
    ) -> OrchestrateResult<ConsensusResult> {
        if candidate_ids.is_empty() {
            return Err(OrchestrateError::Config {
                detail: "锦标赛候选列表为空".to_string(),
            });
        }

        let deadline = task_deadline(task, self.max_task_deadline_ms);
        let limit = concurrency_limit.max(1);

        tracing::info!(
            "[Tournament] task={} candidates={} concurrency={}",
            task.id,
            candidate_ids.len(),
            limit
        );

        // 受限并发扇出；一个候选的失败不触发降级，所有候选本就在并行跑
        let mut settled: HashMap<usize, Result<_, _>> = HashMap::new();
        {
            let runs = candidate_ids.iter().enumerate().map(|(position, model_id)| {
                let shared = self.shared.clone();
                let timeout = self.candidate_timeout;
                async move {
                    let outcome =
                        execute_candidate(&shared, task, model_id, timeout, &deadline).await;
                    (position, outcome)
                }
            });
            let mut in_flight = futures::stream::iter(runs).buffer_unordered(limit);

            let global_timeout = tokio::time::sleep(deadline.remaining());
            tokio::pin!(global_timeout);

            loop {
                tokio::select! {
                    item = in_flight.next() => match item {
                        Some((position, outcome)) => {
                            settled.insert(position, outcome);
                        }
                        None => break,
                    },
                    _ = &mut global_timeout => {
                        // 全局截止：丢弃仍在飞行中的分支（结构化取消）
                        tracing::warn!(
                            "[Tournament] task={} 全局截止时间已到，落定 {}/{}",
                            task.id,
                            settled.len(),
                            candidate_ids.len()
                        );
                        break;
                    }
                }
            }
        }

        // 按候选原始顺序汇总尝试历史与成功结果
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut scored: Vec<(usize, ScoredCandidate)> = Vec::new();

        for (position, model_id) in candidate_ids.iter().enumerate() {
            match settled.remove(&position) {
                Some(Ok(success)) => {
                    attempts.push(AttemptRecord::success(
                        model_id,
                        &success.model.provider_id,
                        success.latency_ms,
                    ));
                    let candidate = CandidateResult {
                        model_id: model_id.clone(),
                        provider_id: success.model.provider_id.clone(),
                        content: success.response.content,
                        usage: success.response.usage,
                        latency_ms: success.latency_ms,
                    };
                    let score = scorer.score(task, &candidate);
                    scored.push((position, ScoredCandidate { candidate, score }));
                }
                Some(Err(failure)) => {
                    attempts.push(failure.record(model_id));
                }
                None => {
                    attempts.push(AttemptRecord::failure(
                        model_id,
                        "unknown",
                        AttemptOutcome::TransientFailure,
                        "未在全局截止时间内落定",
                        deadline.remaining().as_millis() as u64,
                    ));
                }
            }
        }

        // 没有任何成功候选时绝不凭空捏造胜者
        if scored.is_empty() {
            return Err(OrchestrateError::AllCandidatesExhausted { attempts });
        }

        // 最高分胜出，平分取原始顺序靠前者
        let winner = scored
            .iter()
            .max_by(|(pos_a, a), (pos_b, b)| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| pos_b.cmp(pos_a))
            })
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| scored[0].1.clone());

        tracing::info!(
            "[Tournament] task={} winner={} score={:.3} successes={}",
            task.id,
            winner.candidate.model_id,
            winner.score,
            scored.len()
        );

        Ok(ConsensusResult {
            winner,
            scored: scored.into_iter().map(|(_, s)| s).collect(),
            scorer_id: scorer.id().to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::FnScorer;
    use dashmap::DashMap;
    use modelcast_core::models::{Capability, ModelDescriptor, ProviderDescriptor};
    use modelcast_core::registry::{BreakerConfig, ModelRegistry};
    use modelcast_infra::{AdmissionMode, ProviderRateLimiter};
    use modelcast_providers::adapter::ProviderAdapter;
    use modelcast_providers::mock::{ScriptedAdapter, ScriptedOutcome};

    fn evaluator(adapters: Vec<(&str, Arc<ScriptedAdapter>)>) -> TournamentEvaluator {
        let registry = Arc::new(ModelRegistry::with_breaker_config(BreakerConfig::new(
            5, 60_000, 30_000,
        )));
        let map: Arc<DashMap<String, Arc<dyn ProviderAdapter>>> = Arc::new(DashMap::new());
        for (provider_id, adapter) in adapters {
            registry.register_provider(
                ProviderDescriptor::new(provider_id, "KEY").with_capability(Capability::Chat),
            );
            registry
                .register_model(
                    ModelDescriptor::new(&format!("model-{provider_id}"), provider_id)
                        .with_capability(Capability::Chat),
                )
                .unwrap();
            map.insert(provider_id.to_string(), adapter as Arc<dyn ProviderAdapter>);
        }
        TournamentEvaluator::new(
            Shared {
                registry,
                limiter: ProviderRateLimiter::new(AdmissionMode::Reject),
                adapters: map,
            },
            5_000,
            300_000,
        )
    }

    fn length_scorer() -> Arc<dyn Scorer> {
        Arc::new(FnScorer::new("length", |_task, c| {
            c.content.chars().count() as f64
        }))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_one_failure_two_successes_returns_winner() {
        let a = Arc::new(ScriptedAdapter::new("pa").with_outcome(ScriptedOutcome::Success {
            content: "短".to_string(),
            latency_ms: 0,
        }));
        let b = Arc::new(ScriptedAdapter::new("pb").with_outcome(ScriptedOutcome::Transient {
            detail: "503".to_string(),
        }));
        let c = Arc::new(ScriptedAdapter::new("pc").with_outcome(ScriptedOutcome::Success {
            content: "长长长长长".to_string(),
            latency_ms: 0,
        }));
        let evaluator = evaluator(vec![("pa", a), ("pb", b), ("pc", c)]);
        let task = Task::new(Capability::Chat, "你好");

        let result = evaluator
            .evaluate(
                &task,
                &ids(&["model-pa", "model-pb", "model-pc"]),
                3,
                length_scorer(),
            )
            .await
            .unwrap();

        // 胜者在两个成功者之中
        assert_eq!(result.winner.candidate.model_id, "model-pc");
        assert_eq!(result.scored.len(), 2);
        assert_eq!(result.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_all_failures_is_exhausted() {
        let a = Arc::new(ScriptedAdapter::new("pa").with_outcome(ScriptedOutcome::Transient {
            detail: "超时".to_string(),
        }));
        let b = Arc::new(ScriptedAdapter::new("pb").with_outcome(ScriptedOutcome::Transient {
            detail: "限流".to_string(),
        }));
        let evaluator = evaluator(vec![("pa", a), ("pb", b)]);
        let task = Task::new(Capability::Chat, "你好");

        let err = evaluator
            .evaluate(&task, &ids(&["model-pa", "model-pb"]), 2, length_scorer())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrateError::AllCandidatesExhausted { .. }
        ));
    }

    #[tokio::test]
    async fn test_tie_break_prefers_earlier_position() {
        let a = Arc::new(ScriptedAdapter::new("pa").with_outcome(ScriptedOutcome::Success {
            content: "同长".to_string(),
            latency_ms: 0,
        }));
        let b = Arc::new(ScriptedAdapter::new("pb").with_outcome(ScriptedOutcome::Success {
            content: "同长".to_string(),
            latency_ms: 0,
        }));
        let evaluator = evaluator(vec![("pa", a), ("pb", b)]);
        let task = Task::new(Capability::Chat, "你好");

        let result = evaluator
            .evaluate(&task, &ids(&["model-pa", "model-pb"]), 2, length_scorer())
            .await
            .unwrap();

        assert_eq!(result.winner.candidate.model_id, "model-pa");
    }

    #[tokio::test]
    async fn test_global_deadline_cuts_slow_candidates() {
        let fast = Arc::new(ScriptedAdapter::new("pa").with_outcome(ScriptedOutcome::Success {
            content: "快".to_string(),
            latency_ms: 0,
        }));
        let slow = Arc::new(
            ScriptedAdapter::new("pb").with_outcome(ScriptedOutcome::Hang { hang_ms: 5_000 }),
        );
        let evaluator = evaluator(vec![("pa", fast), ("pb", slow)]);
        let task = Task::new(Capability::Chat, "你好").with_deadline_ms(100);

        let result = evaluator
            .evaluate(&task, &ids(&["model-pa", "model-pb"]), 2, length_scorer())
            .await
            .unwrap();

        assert_eq!(result.winner.candidate.model_id, "model-pa");
        // 慢候选在历史里留下失败记录
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_config_error() {
        let evaluator = evaluator(vec![]);
        let task = Task::new(Capability::Chat, "你好");

        assert!(matches!(
            evaluator.evaluate(&task, &[], 2, length_scorer()).await,
            Err(OrchestrateError::Config { .. })
        ));
    }
}
