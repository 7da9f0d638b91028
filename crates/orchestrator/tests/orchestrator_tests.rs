//! 编排器端到端测试
//!
//! 通过 ModelOrchestrator 入口覆盖路由、降级、熔断恢复、锦标赛与
//! 历史记录的行为。

use modelcast_core::models::{
    AttemptOutcome, Capability, ModelDescriptor, ProviderDescriptor, QualityTier, SpeedTier, Task,
};
use modelcast_core::registry::{BreakerConfig, CircuitState, ModelRegistry};
use modelcast_core::routing::StrategyKind;
use modelcast_core::OrchestrateError;
use modelcast_orchestrator::{ModelOrchestrator, OrchestratorConfig};
use modelcast_providers::adapter::ProviderAdapter;
use modelcast_providers::mock::{ScriptedAdapter, ScriptedOutcome};
use std::sync::Arc;

fn registry_with_breaker(config: BreakerConfig) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::with_breaker_config(config))
}

fn provider(id: &str, caps: &[Capability]) -> ProviderDescriptor {
    let mut p = ProviderDescriptor::new(id, "KEY");
    for cap in caps {
        p = p.with_capability(*cap);
    }
    p
}

fn chat_model(id: &str, provider_id: &str) -> ModelDescriptor {
    ModelDescriptor::new(id, provider_id).with_capability(Capability::Chat)
}

#[tokio::test]
async fn test_submit_succeeds_when_any_candidate_succeeds() {
    // A 暂时性失败，B 成功：只要链上有能成功的候选，submit 就不会
    // 返回 AllCandidatesExhausted
    let registry = registry_with_breaker(BreakerConfig::new(5, 60_000, 30_000));
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry.register_provider(provider("pb", &[Capability::Chat]));
    registry
        .register_model(chat_model("a-model", "pa").with_quality(QualityTier::Flagship))
        .unwrap();
    registry
        .register_model(chat_model("b-model", "pb").with_quality(QualityTier::Standard))
        .unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa").with_outcome(
        ScriptedOutcome::Transient {
            detail: "503 过载".to_string(),
        },
    )));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pb")));

    let task = Task::new(Capability::Chat, "你好");
    let result = orchestrator
        .submit(&task, StrategyKind::Quality)
        .await
        .unwrap();

    assert_eq!(result.provider_id, "pb");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].model_id, "a-model");
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::TransientFailure);
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Success);
}

#[tokio::test]
async fn test_timeout_then_fallback_reports_history() {
    // A 超时（暂时性），B 成功：结果报 provider=B，历史长度 2
    let registry = registry_with_breaker(BreakerConfig::new(5, 60_000, 30_000));
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry.register_provider(provider("pb", &[Capability::Chat]));
    registry
        .register_model(chat_model("a-model", "pa").with_quality(QualityTier::Flagship))
        .unwrap();
    registry
        .register_model(chat_model("b-model", "pb").with_quality(QualityTier::Standard))
        .unwrap();

    let config = OrchestratorConfig::default().with_candidate_timeout_ms(30);
    let orchestrator = ModelOrchestrator::new(registry, config);
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa").with_outcome(
        ScriptedOutcome::Hang { hang_ms: 5_000 },
    )));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pb")));

    let task = Task::new(Capability::Chat, "你好");
    let result = orchestrator
        .submit(&task, StrategyKind::Quality)
        .await
        .unwrap();

    assert_eq!(result.provider_id, "pb");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::TransientFailure);
    assert!(result.attempts[0].detail.contains("超时"));
}

#[tokio::test]
async fn test_breaker_excludes_then_recovers() {
    // 5 次连续失败后该 Provider 被新链排除；HALF_OPEN 一次成功回到 CLOSED
    let registry = registry_with_breaker(BreakerConfig::new(5, 60_000, 0));
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry.register_provider(provider("pb", &[Capability::Chat]));
    registry
        .register_model(chat_model("a-model", "pa").with_quality(QualityTier::Flagship))
        .unwrap();
    registry
        .register_model(chat_model("b-model", "pb").with_quality(QualityTier::Standard))
        .unwrap();

    for _ in 0..5 {
        registry.report_outcome("a-model", false).unwrap();
    }
    assert_eq!(registry.breaker_state("pa"), Some(CircuitState::Open));

    // 冷却为 0：下一次资格查询转入 HALF_OPEN，一次成功即恢复
    assert!(!registry.eligible_models(Capability::Chat).is_empty());
    assert!(registry.try_acquire("pa"));
    registry.report_outcome("a-model", true).unwrap();
    assert_eq!(registry.breaker_state("pa"), Some(CircuitState::Closed));

    let chain_models: Vec<String> = registry
        .eligible_models(Capability::Chat)
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert!(chain_models.contains(&"a-model".to_string()));
}

#[tokio::test]
async fn test_code_generation_capability_routing() {
    // 声明 code_generation 能力的 Provider，其模型出现在对应任务的候选里
    let registry = registry_with_breaker(BreakerConfig::default());
    registry.register_provider(provider("pa", &[Capability::CodeGeneration]));
    registry
        .register_model(
            ModelDescriptor::new("coder", "pa").with_capability(Capability::CodeGeneration),
        )
        .unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa")));

    let task = Task::new(Capability::CodeGeneration, "写一个快速排序");
    let decision = orchestrator.route(&task, StrategyKind::Quality).unwrap();
    assert_eq!(decision.chain, vec!["coder"]);

    // 能力不匹配的任务拿不到链
    let chat_task = Task::new(Capability::Chat, "你好");
    assert!(matches!(
        orchestrator.route(&chat_task, StrategyKind::Quality),
        Err(OrchestrateError::NoEligibleModels { .. })
    ));
}

#[tokio::test]
async fn test_cost_strategy_orders_cheaper_first() {
    // 估算成本 0.002 与 0.0008：0.0008 的模型排在链首
    let registry = registry_with_breaker(BreakerConfig::default());
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry
        .register_model(
            chat_model("pricey", "pa")
                .with_pricing(0.4, 1.95)
                .with_quality(QualityTier::Premium),
        )
        .unwrap();
    registry
        .register_model(
            chat_model("cheap", "pa")
                .with_pricing(0.15, 0.78)
                .with_quality(QualityTier::Standard),
        )
        .unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    let task = Task::new(Capability::Chat, "你好").with_max_output_tokens(1024);

    let decision = orchestrator.route(&task, StrategyKind::Cost).unwrap();
    assert_eq!(decision.chain[0], "cheap");
    assert_eq!(decision.chain[1], "pricey");
}

#[tokio::test]
async fn test_route_is_deterministic() {
    let registry = registry_with_breaker(BreakerConfig::default());
    registry.register_provider(provider("pa", &[Capability::Chat]));
    for i in 0..6 {
        registry
            .register_model(
                chat_model(&format!("m{i}"), "pa")
                    .with_quality(if i % 2 == 0 {
                        QualityTier::Premium
                    } else {
                        QualityTier::Standard
                    })
                    .with_speed(if i % 3 == 0 {
                        SpeedTier::Fast
                    } else {
                        SpeedTier::Slow
                    })
                    .with_pricing(i as f64, i as f64 * 2.0),
            )
            .unwrap();
    }

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    let task = Task::new(Capability::Chat, "你好");

    for strategy in [
        StrategyKind::Quality,
        StrategyKind::Cost,
        StrategyKind::Speed,
        StrategyKind::Balanced,
    ] {
        let first = orchestrator.route(&task, strategy).unwrap();
        for _ in 0..8 {
            let again = orchestrator.route(&task, strategy).unwrap();
            assert_eq!(first.chain, again.chain, "策略 {strategy} 的链应当确定");
        }
    }
}

#[tokio::test]
async fn test_tournament_one_failure_two_successes() {
    // 3 个候选，1 失败 2 成功：无错误返回，胜者来自成功者
    let registry = registry_with_breaker(BreakerConfig::default());
    for p in ["pa", "pb", "pc"] {
        registry.register_provider(provider(p, &[Capability::Chat]));
    }
    registry.register_model(chat_model("a-model", "pa")).unwrap();
    registry.register_model(chat_model("b-model", "pb")).unwrap();
    registry.register_model(chat_model("c-model", "pc")).unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa").with_outcome(
        ScriptedOutcome::Success {
            content: "候选 A 的回答".to_string(),
            latency_ms: 0,
        },
    )));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pb").with_outcome(
        ScriptedOutcome::Transient {
            detail: "503".to_string(),
        },
    )));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pc").with_outcome(
        ScriptedOutcome::Success {
            content: "候选 C 的回答".to_string(),
            latency_ms: 0,
        },
    )));

    let task = Task::new(Capability::Chat, "你好");
    let candidates: Vec<String> = ["a-model", "b-model", "c-model"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let result = orchestrator
        .submit_tournament(&task, &candidates, 3)
        .await
        .unwrap();

    assert_eq!(result.scored.len(), 2);
    assert!(["a-model", "c-model"].contains(&result.winner.candidate.model_id.as_str()));
    assert_eq!(result.attempts.len(), 3);
}

#[tokio::test]
async fn test_specific_strategy_no_substitution() {
    let registry = registry_with_breaker(BreakerConfig::new(1, 60_000, 60_000));
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry.register_provider(provider("pb", &[Capability::Chat]));
    registry.register_model(chat_model("a-model", "pa")).unwrap();
    registry.register_model(chat_model("b-model", "pb")).unwrap();

    // pa 熔断
    registry.report_outcome("a-model", false).unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa")));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pb")));

    // 指定了熔断中的模型：终止错误，绝不替换成 b-model
    let task = Task::new(Capability::Chat, "你好").with_pinned_model("a-model");
    let result = orchestrator.submit(&task, StrategyKind::Specific).await;
    assert!(matches!(
        result,
        Err(OrchestrateError::TerminalRequest { .. })
    ));
}

#[tokio::test]
async fn test_exhausted_error_carries_full_history() {
    let registry = registry_with_breaker(BreakerConfig::new(10, 60_000, 30_000));
    registry.register_provider(provider("pa", &[Capability::Chat]));
    registry.register_provider(provider("pb", &[Capability::Chat]));
    registry.register_model(chat_model("a-model", "pa")).unwrap();
    registry.register_model(chat_model("b-model", "pb")).unwrap();

    let orchestrator = ModelOrchestrator::new(registry, OrchestratorConfig::default());
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pa").with_outcome(
        ScriptedOutcome::Transient {
            detail: "超时".to_string(),
        },
    )));
    orchestrator.register_adapter(Arc::new(ScriptedAdapter::new("pb").with_outcome(
        ScriptedOutcome::Transient {
            detail: "限流".to_string(),
        },
    )));

    let task = Task::new(Capability::Chat, "你好");
    let err = orchestrator
        .submit(&task, StrategyKind::Quality)
        .await
        .unwrap_err();

    let attempts = err.attempts().expect("耗尽错误应携带历史");
    assert_eq!(attempts.len(), 2);
    assert!(attempts
        .iter()
        .all(|a| a.outcome == AttemptOutcome::TransientFailure));
}
