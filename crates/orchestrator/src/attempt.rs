//! 单候选执行路径
//!
//! 调度、锦标赛与流式打开共用的一次候选调用：熔断占位 → 限流准入 →
//! 截止时间夹取的超时 → 适配器调用 → 结局分类 → 健康上报。
//!
//! 健康上报规则：只有 Provider 自身的故障信号（超时、5xx、厂商限流）
//! 计入熔断失败；终止性失败与本地限流拒绝不计入。

use dashmap::DashMap;
use modelcast_core::models::{AttemptOutcome, AttemptRecord, ModelDescriptor, Task};
use modelcast_core::registry::ModelRegistry;
use modelcast_infra::{Deadline, ProviderRateLimiter};
use modelcast_providers::adapter::{
    AdapterError, ProviderAdapter, ProviderRequest, ProviderResponse,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 引擎间共享的运行时对象
#[derive(Clone)]
pub(crate) struct Shared {
    pub registry: Arc<ModelRegistry>,
    pub limiter: ProviderRateLimiter,
    pub adapters: Arc<DashMap<String, Arc<dyn ProviderAdapter>>>,
}

impl Shared {
    pub fn adapter(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).map(|a| a.value().clone())
    }
}

/// 任务的有效截止时间：任务自带截止时长被配置上限夹取
pub(crate) fn task_deadline(task: &Task, ceiling_ms: u64) -> Deadline {
    Deadline::after_ms(task.constraints.deadline_ms.min(ceiling_ms))
}

/// 候选调用成功
#[derive(Debug)]
pub(crate) struct CandidateSuccess {
    pub model: ModelDescriptor,
    pub response: ProviderResponse,
    pub latency_ms: u64,
}

/// 候选调用失败
pub(crate) struct CandidateFailure {
    pub provider_id: String,
    pub outcome: AttemptOutcome,
    pub detail: String,
    pub latency_ms: u64,
}

impl CandidateFailure {
    fn new(provider_id: &str, outcome: AttemptOutcome, detail: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            outcome,
            detail: detail.into(),
            latency_ms: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome == AttemptOutcome::TerminalFailure
    }

    pub fn record(&self, model_id: &str) -> AttemptRecord {
        AttemptRecord::failure(
            model_id,
            &self.provider_id,
            self.outcome,
            &self.detail,
            self.latency_ms,
        )
    }
}

/// 执行一次候选调用
pub(crate) async fn execute_candidate(
    shared: &Shared,
    task: &Task,
    model_id: &str,
    candidate_timeout: Duration,
    deadline: &Deadline,
) -> Result<CandidateSuccess, CandidateFailure> {
    let Some(model) = shared.registry.model(model_id) else {
        return Err(CandidateFailure::new(
            "unknown",
            AttemptOutcome::TerminalFailure,
            format!("模型未注册: {model_id}"),
        ));
    };
    let provider_id = model.provider_id.clone();

    let Some(adapter) = shared.adapter(&provider_id) else {
        return Err(CandidateFailure::new(
            &provider_id,
            AttemptOutcome::TerminalFailure,
            format!("Provider 适配器未注册: {provider_id}"),
        ));
    };

    // 熔断占位：HALF_OPEN 下只放行一次试探
    if !shared.registry.try_acquire(&provider_id) {
        return Err(CandidateFailure::new(
            &provider_id,
            AttemptOutcome::CircuitOpen,
            "Provider 熔断中",
        ));
    }

    // 限流准入，等待受剩余截止时间约束
    let permit = match shared
        .limiter
        .acquire(&provider_id, Some(deadline.remaining()))
        .await
    {
        Ok(permit) => permit,
        Err(e) => {
            // 没有发起真正的调用，归还试探名额，也不计入熔断
            shared.registry.release_probe(&provider_id);
            return Err(CandidateFailure::new(
                &provider_id,
                AttemptOutcome::RateLimited,
                e.to_string(),
            ));
        }
    };

    let timeout = deadline.clamp(candidate_timeout);
    let request = ProviderRequest::from_task(task, model_id);
    let started = Instant::now();

    let result = tokio::time::timeout(timeout, adapter.call(request, timeout)).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    // 调用已经发出，令牌保持消耗
    drop(permit);

    match result {
        Ok(Ok(response)) => {
            let _ = shared.registry.report_outcome(model_id, true);
            Ok(CandidateSuccess {
                model,
                response,
                latency_ms,
            })
        }
        Ok(Err(AdapterError::Transient { detail, .. })) => {
            let _ = shared.registry.report_outcome(model_id, false);
            Err(CandidateFailure {
                provider_id,
                outcome: AttemptOutcome::TransientFailure,
                detail,
                latency_ms,
            })
        }
        Ok(Err(AdapterError::Terminal { detail, .. })) => {
            // 不是 Provider 的故障信号，不计入熔断，归还试探名额
            shared.registry.release_probe(&provider_id);
            Err(CandidateFailure {
                provider_id,
                outcome: AttemptOutcome::TerminalFailure,
                detail,
                latency_ms,
            })
        }
        Err(_) => {
            let _ = shared.registry.report_outcome(model_id, false);
            Err(CandidateFailure {
                provider_id,
                outcome: AttemptOutcome::TransientFailure,
                detail: format!("调用超时 ({timeout:?})"),
                latency_ms,
            })
        }
    }
}
