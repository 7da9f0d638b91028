//! 统一编排接口
//!
//! 注册表、限流器、适配器都是显式对象，由这里组装后传引用给各引擎，
//! 没有进程级单例。

use crate::attempt::Shared;
use crate::config::OrchestratorConfig;
use crate::dispatcher::DispatchEngine;
use crate::scorer::{Scorer, ScorerRegistry};
use crate::streaming::{StreamHandle, StreamManager};
use crate::tournament::TournamentEvaluator;
use dashmap::DashMap;
use modelcast_core::errors::{OrchestrateError, OrchestrateResult};
use modelcast_core::models::{CompletionResult, ConsensusResult, Task};
use modelcast_core::registry::{BreakerSnapshot, ModelRegistry};
use modelcast_core::routing::{
    create_registry_with_weights, ChainSelector, RoutingDecision, StrategyKind,
};
use modelcast_infra::{BucketConfig, ProviderRateLimiter, Retrier};
use modelcast_providers::adapter::ProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// 模型编排器
///
/// 对任务提交层暴露三个入口：同步式 `submit`、增量式
/// `submit_streaming`、共识式 `submit_tournament`。
pub struct ModelOrchestrator {
    registry: Arc<ModelRegistry>,
    limiter: ProviderRateLimiter,
    adapters: Arc<DashMap<String, Arc<dyn ProviderAdapter>>>,
    selector: ChainSelector,
    dispatcher: DispatchEngine,
    tournament: TournamentEvaluator,
    streaming: StreamManager,
    scorers: ScorerRegistry,
    config: OrchestratorConfig,
}

impl ModelOrchestrator {
    /// 创建编排器
    ///
    /// 注册表由外部构建并注入；熔断配置以注册表构建时的为准。
    pub fn new(registry: Arc<ModelRegistry>, config: OrchestratorConfig) -> Self {
        let limiter = ProviderRateLimiter::new(config.admission);
        let adapters: Arc<DashMap<String, Arc<dyn ProviderAdapter>>> = Arc::new(DashMap::new());
        let shared = Shared {
            registry: registry.clone(),
            limiter: limiter.clone(),
            adapters,
        };

        let selector = ChainSelector::with_strategies(
            registry.clone(),
            create_registry_with_weights(config.balanced_weights),
        )
        .with_max_chain_length(config.max_chain_length);

        let dispatcher = DispatchEngine::new(
            shared.clone(),
            Retrier::new(config.retry.clone()),
            config.candidate_timeout_ms,
            config.task_deadline_ms,
        );
        let tournament = TournamentEvaluator::new(
            shared.clone(),
            config.candidate_timeout_ms,
            config.task_deadline_ms,
        );
        let streaming = StreamManager::new(
            shared.clone(),
            config.candidate_timeout_ms,
            config.task_deadline_ms,
        );

        Self {
            registry,
            limiter,
            adapters: shared.adapters.clone(),
            selector,
            dispatcher,
            tournament,
            streaming,
            scorers: ScorerRegistry::with_builtins(),
            config,
        }
    }

    /// 使用配置里的熔断参数创建空注册表并构建编排器
    ///
    /// 随后通过 [`ModelOrchestrator::registry`] 注册 Provider 与模型。
    pub fn with_fresh_registry(config: OrchestratorConfig) -> Self {
        let registry = Arc::new(ModelRegistry::with_breaker_config(config.breaker));
        Self::new(registry, config)
    }

    /// 注册 Provider 适配器
    ///
    /// 同时按注册表里的配额给该 Provider 安装限流桶。
    pub fn register_adapter(&self, adapter: Arc<dyn ProviderAdapter>) {
        let provider_id = adapter.id().to_string();
        if let Some(quota) = self.registry.quota(&provider_id) {
            self.limiter.set_quota(
                &provider_id,
                BucketConfig {
                    max_requests: quota.max_requests,
                    window_ms: quota.window_ms,
                },
            );
        }
        tracing::info!("[Orchestrator] 注册适配器: {}", provider_id);
        self.adapters.insert(provider_id, adapter);
    }

    /// 注册自定义评分器
    pub fn register_scorer(&mut self, scorer: Arc<dyn Scorer>) {
        self.scorers.register(scorer);
    }

    /// 注册表引用
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// 仅做路由决策，不发起调用
    pub fn route(&self, task: &Task, strategy: StrategyKind) -> OrchestrateResult<RoutingDecision> {
        self.selector.select(task, strategy)
    }

    /// 提交任务，内部沿降级链调度
    pub async fn submit(
        &self,
        task: &Task,
        strategy: StrategyKind,
    ) -> OrchestrateResult<CompletionResult> {
        let decision = self.selector.select(task, strategy)?;
        tracing::info!(
            "[Orchestrator] submit task={} strategy={} chain_len={}",
            task.id,
            strategy,
            decision.chain.len()
        );
        self.dispatcher.dispatch(&decision, task).await
    }

    /// 使用默认策略提交任务
    pub async fn submit_default(&self, task: &Task) -> OrchestrateResult<CompletionResult> {
        self.submit(task, self.config.default_strategy).await
    }

    /// 提交流式任务
    pub async fn submit_streaming(
        &self,
        task: &Task,
        strategy: StrategyKind,
    ) -> OrchestrateResult<StreamHandle> {
        let decision = self.selector.select(task, strategy)?;
        tracing::info!(
            "[Orchestrator] submit_streaming task={} strategy={}",
            task.id,
            strategy
        );
        self.streaming.open(task, &decision).await
    }

    /// 提交锦标赛任务（使用配置的默认评分器）
    pub async fn submit_tournament(
        &self,
        task: &Task,
        candidate_ids: &[String],
        concurrency_limit: usize,
    ) -> OrchestrateResult<ConsensusResult> {
        let scorer = self
            .scorers
            .get(&self.config.scorer_id)
            .or_else(|| self.scorers.get_default())
            .ok_or_else(|| OrchestrateError::Config {
                detail: format!("评分器不存在: {}", self.config.scorer_id),
            })?;
        self.submit_tournament_with_scorer(task, candidate_ids, concurrency_limit, scorer)
            .await
    }

    /// 提交锦标赛任务（显式注入评分器）
    pub async fn submit_tournament_with_scorer(
        &self,
        task: &Task,
        candidate_ids: &[String],
        concurrency_limit: usize,
        scorer: Arc<dyn Scorer>,
    ) -> OrchestrateResult<ConsensusResult> {
        let limit = concurrency_limit
            .max(1)
            .min(self.config.tournament_concurrency.max(1));
        self.tournament
            .evaluate(task, candidate_ids, limit, scorer)
            .await
    }

    /// 所有 Provider 的熔断状态快照
    pub fn breaker_snapshot(&self) -> HashMap<String, BreakerSnapshot> {
        self.registry.breaker_snapshot()
    }
}
